//! 动作系统
//!
//! 每个动作分两步：`check` 只读地判断是否合法，`execute` 修改世界并给出结果。
//! `Action::execute` 是唯一的外部入口，负责先校验再执行，
//! 并把执行期间的内部错误转换成失败结果，错误不会越过动作边界。

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use error::ContentError;

use crate::config::SimConfig;
use crate::content::ContentRegistry;
use crate::entity::{AttrMap, AttrValue, EntityId, EquipSlot, attr_map};
use crate::event_bus::{EventKind, EventRecord};
use crate::world::WorldState;

pub mod attack;
pub mod crafting;
pub mod descend;
pub mod equip;
pub mod hooks;
pub mod mining;
pub mod movement;

pub use attack::{AttackAction, compute_damage, effective_attack, effective_defense};
pub use crafting::CraftAction;
pub use descend::{DescendAction, WaitAction};
pub use equip::{EquipAction, UnequipAction};
pub use hooks::{ActionHook, CustomAction, HookRegistry};
pub use mining::{MineAction, SurveyAction, mining_turns};
pub use movement::MoveAction;

/// 结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeStatus {
    /// 动作已生效
    Success,
    /// 合法请求，但当前条件不满足(资源不足、不在熔炉旁等)
    Failure,
    /// 请求本身不合法(目标不存在、非相邻、步长错误等)
    Invalid,
    /// 被地形或实体阻挡
    Blocked,
}

/// 动作结果，执行完成后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub turn_consumed: bool,
    pub messages: Vec<String>,
    pub events: Vec<EventRecord>,
}

impl Outcome {
    pub fn success(turn_consumed: bool) -> Self {
        Self::with_status(OutcomeStatus::Success, turn_consumed)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_status(OutcomeStatus::Failure, false).message(message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::with_status(OutcomeStatus::Invalid, false).message(message)
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::with_status(OutcomeStatus::Blocked, false).message(message)
    }

    fn with_status(status: OutcomeStatus, turn_consumed: bool) -> Self {
        Self {
            status,
            turn_consumed,
            messages: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn event(mut self, kind: EventKind, data: AttrMap) -> Self {
        self.events.push(EventRecord::new(kind, data));
        self
    }

    pub(crate) fn push_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub(crate) fn push_event(&mut self, kind: EventKind, data: AttrMap) {
        self.events.push(EventRecord::new(kind, data));
    }

    /// 合并另一个结果的消息与事件
    pub(crate) fn absorb(&mut self, other: Outcome) {
        self.messages.extend(other.messages);
        self.events.extend(other.events);
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn has_event(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }
}

/// 校验阶段拒绝动作的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: OutcomeStatus,
    pub message: String,
}

impl Rejection {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Invalid,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            message: message.into(),
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Blocked,
            message: message.into(),
        }
    }
}

/// 执行期间的内部错误
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("entity {0} does not exist")]
    MissingEntity(EntityId),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("malformed action request: {0}")]
    MalformedRequest(String),

    #[error("hook `{hook}` failed: {source}")]
    Hook {
        hook: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("inconsistent world state: {0}")]
    Inconsistent(String),
}

/// 动作执行所需的只读上下文
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    pub content: &'a ContentRegistry,
    pub config: &'a SimConfig,
    pub hooks: &'a HookRegistry,
}

/// 具体动作需要实现的接口
pub trait ActionHandler {
    fn name(&self) -> &'static str;

    fn actor(&self) -> EntityId;

    /// 只读校验，失败时不得修改任何状态
    fn check(&self, world: &WorldState, ctx: &ActionContext) -> Result<(), Rejection>;

    /// 在校验通过后执行
    fn execute(&self, world: &mut WorldState, ctx: &ActionContext) -> Result<Outcome, ActionError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Action {
    Move(MoveAction),
    Attack(AttackAction),
    Mine(MineAction),
    Survey(SurveyAction),
    Craft(CraftAction),
    Equip(EquipAction),
    Unequip(UnequipAction),
    Descend(DescendAction),
    Wait(WaitAction),
    Custom(CustomAction),
}

impl Action {
    fn handler(&self) -> &dyn ActionHandler {
        match self {
            Action::Move(a) => a,
            Action::Attack(a) => a,
            Action::Mine(a) => a,
            Action::Survey(a) => a,
            Action::Craft(a) => a,
            Action::Equip(a) => a,
            Action::Unequip(a) => a,
            Action::Descend(a) => a,
            Action::Wait(a) => a,
            Action::Custom(a) => a,
        }
    }

    pub fn name(&self) -> &'static str {
        self.handler().name()
    }

    pub fn actor(&self) -> EntityId {
        self.handler().actor()
    }

    /// 只读判断动作当前是否合法
    pub fn validate(&self, world: &WorldState, ctx: &ActionContext) -> bool {
        self.handler().check(world, ctx).is_ok()
    }

    /// 校验并执行。校验失败时世界保持不变
    pub fn execute(&self, world: &mut WorldState, ctx: &ActionContext) -> Outcome {
        let handler = self.handler();
        if let Err(rejection) = handler.check(world, ctx) {
            tracing::debug!(
                action = handler.name(),
                actor = %handler.actor(),
                status = %rejection.status,
                reason = %rejection.message,
                "action rejected"
            );
            let data = attr_map([
                ("actor", handler.actor().into()),
                ("action", handler.name().into()),
                ("reason", rejection.message.clone().into()),
            ]);
            return Outcome::with_status(rejection.status, false)
                .message(rejection.message)
                .event(EventKind::ActionRejected, data);
        }

        match handler.execute(world, ctx) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(action = handler.name(), actor = %handler.actor(), error = %err, "action failed");
                let data = attr_map([
                    ("actor", handler.actor().into()),
                    ("action", handler.name().into()),
                    ("error", err.to_string().into()),
                ]);
                Outcome::failure(format!("The {} action failed: {err}", handler.name()))
                    .event(EventKind::ActionFailed, data)
            }
        }
    }

    pub fn to_request(&self) -> ActionRequest {
        let mut params = AttrMap::new();
        params.insert("actor".into(), self.actor().into());
        match self {
            Action::Move(a) => {
                params.insert("dx".into(), a.dx.into());
                params.insert("dy".into(), a.dy.into());
            }
            Action::Attack(a) => {
                params.insert("target".into(), a.target.into());
            }
            Action::Mine(a) => {
                params.insert("vein".into(), a.vein.into());
            }
            Action::Survey(a) => {
                params.insert("vein".into(), a.vein.into());
            }
            Action::Craft(a) => {
                params.insert("recipe".into(), a.recipe.clone().into());
            }
            Action::Equip(a) => {
                params.insert("item".into(), a.item.into());
            }
            Action::Unequip(a) => {
                params.insert("slot".into(), a.slot.to_string().into());
            }
            Action::Descend(_) | Action::Wait(_) => {}
            Action::Custom(a) => {
                params.insert("hook".into(), a.hook.clone().into());
                params.extend(a.params.clone());
            }
        }
        ActionRequest {
            action_type: self.name().to_string(),
            params,
        }
    }

    pub fn from_request(request: &ActionRequest) -> Result<Self, ActionError> {
        let actor = request.id("actor")?;
        let action = match request.action_type.as_str() {
            "move" => Action::Move(MoveAction {
                actor,
                dx: request.int("dx")? as i32,
                dy: request.int("dy")? as i32,
            }),
            "attack" => Action::Attack(AttackAction {
                actor,
                target: request.id("target")?,
            }),
            "mine" => Action::Mine(MineAction {
                actor,
                vein: request.id("vein")?,
            }),
            "survey" => Action::Survey(SurveyAction {
                actor,
                vein: request.id("vein")?,
            }),
            "craft" => Action::Craft(CraftAction {
                actor,
                recipe: request.text("recipe")?.to_string(),
            }),
            "equip" => Action::Equip(EquipAction {
                actor,
                item: request.id("item")?,
            }),
            "unequip" => {
                let slot = request.text("slot")?;
                let slot: EquipSlot = slot
                    .parse()
                    .map_err(|_| ActionError::MalformedRequest(format!("unknown slot `{slot}`")))?;
                Action::Unequip(UnequipAction { actor, slot })
            }
            "descend" => Action::Descend(DescendAction { actor }),
            "wait" => Action::Wait(WaitAction { actor }),
            "custom" => {
                let hook = request.text("hook")?.to_string();
                let params = request
                    .params
                    .iter()
                    .filter(|(k, _)| k.as_str() != "actor" && k.as_str() != "hook")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Action::Custom(CustomAction { actor, hook, params })
            }
            other => {
                return Err(ActionError::MalformedRequest(format!("unknown action type `{other}`")));
            }
        };
        Ok(action)
    }
}

/// 扁平的动作请求，便于日志记录与回放
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_type: String,
    #[serde(default)]
    pub params: AttrMap,
}

impl ActionRequest {
    pub fn new(action_type: &str, params: AttrMap) -> Self {
        Self {
            action_type: action_type.to_string(),
            params,
        }
    }

    fn param(&self, key: &str) -> Result<&AttrValue, ActionError> {
        self.params
            .get(key)
            .ok_or_else(|| ActionError::MalformedRequest(format!("missing parameter `{key}`")))
    }

    fn int(&self, key: &str) -> Result<i64, ActionError> {
        self.param(key)?
            .as_i64()
            .ok_or_else(|| ActionError::MalformedRequest(format!("parameter `{key}` must be a number")))
    }

    fn id(&self, key: &str) -> Result<EntityId, ActionError> {
        let raw = self.int(key)?;
        u64::try_from(raw)
            .map(EntityId)
            .map_err(|_| ActionError::MalformedRequest(format!("parameter `{key}` is not an entity id")))
    }

    fn text(&self, key: &str) -> Result<&str, ActionError> {
        self.param(key)?
            .as_str()
            .ok_or_else(|| ActionError::MalformedRequest(format!("parameter `{key}` must be text")))
    }
}

/// 判断攻击者能否把目标当作敌人
pub(crate) fn hostile(world: &WorldState, attacker: EntityId, target: EntityId) -> bool {
    match (world.get(attacker), world.get(target)) {
        (Some(a), Some(t)) => t.attackable && a.is_player() != t.is_player(),
        _ => false,
    }
}

/// 校验阶段常用：实体存在、存活且在地图上
pub(crate) fn living_actor<'w>(
    world: &'w WorldState,
    id: EntityId,
) -> Result<&'w crate::entity::Entity, Rejection> {
    let actor = world
        .get(id)
        .ok_or_else(|| Rejection::invalid(format!("Actor {id} does not exist.")))?;
    if !actor.is_alive() {
        return Err(Rejection::invalid(format!("{} is dead.", actor.name)));
    }
    if actor.position.is_none() {
        return Err(Rejection::invalid(format!("{} is not on the map.", actor.name)));
    }
    Ok(actor)
}
