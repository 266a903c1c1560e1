//! 怪物 AI：按行为标签查表选择决策函数，决策结果是普通动作，
//! 与玩家动作走同一套校验与执行流程。

use dungeon::pathfinding::{Connectivity, chebyshev, distance_squared, neighbor_offsets};
use dungeon::{Pathfinder, PathfindingConfig, Pos};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::actions::{Action, ActionContext, AttackAction, MoveAction, Outcome, WaitAction};
use crate::entity::EntityId;
use crate::world::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Behavior {
    /// 看到玩家就追击
    #[default]
    Aggressive,
    /// 追击，生命过低时逃跑
    Defensive,
    /// 闲逛，被攻击后转为追击
    Passive,
    /// 玩家靠近时逃跑
    Coward,
    /// 守在出生点附近，只追击进入警戒范围的玩家
    Guard,
}

impl Behavior {
    /// 解析行为标签，未知标签回退为默认行为
    pub fn from_tag(tag: &str) -> Self {
        tag.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(tag, "unknown behavior tag, using aggressive");
            Behavior::default()
        })
    }
}

/// 挂在实体上的 AI 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiState {
    pub behavior: Behavior,
    pub spawn: Pos,
    /// 被攻击过
    pub provoked: bool,
}

impl AiState {
    pub fn new(behavior: Behavior, spawn: Pos) -> Self {
        Self {
            behavior,
            spawn,
            provoked: false,
        }
    }
}

type DecideFn = fn(&AiEngine, &mut WorldState, &ActionContext, EntityId, Pos) -> Action;

fn decision_table(behavior: Behavior) -> DecideFn {
    match behavior {
        Behavior::Aggressive => aggressive,
        Behavior::Defensive => defensive,
        Behavior::Passive => passive,
        Behavior::Coward => coward,
        Behavior::Guard => guard,
    }
}

#[derive(Debug, Clone)]
pub struct AiEngine {
    pathfinder: Pathfinder,
}

impl AiEngine {
    pub fn new(config: PathfindingConfig) -> Self {
        Self {
            pathfinder: Pathfinder::new(config),
        }
    }

    /// 为单个实体选择动作。没有 AI 或不能行动时等待
    pub fn decide(&self, world: &mut WorldState, ctx: &ActionContext, actor: EntityId) -> Action {
        let wait = Action::Wait(WaitAction { actor });
        let Some(entity) = world.get(actor).filter(|e| e.is_alive()) else {
            return wait;
        };
        let (Some(ai), Some(pos)) = (entity.ai, entity.position) else {
            return wait;
        };
        decision_table(ai.behavior)(self, world, ctx, actor, pos)
    }

    /// 所有 AI 实体按句柄顺序各行动一次
    pub fn run_turn(&self, world: &mut WorldState, ctx: &ActionContext) -> Vec<(EntityId, Outcome)> {
        let mut results = Vec::new();
        for id in world.actor_ids() {
            if !world.player.is_alive() {
                break;
            }
            if !world.get(id).is_some_and(|e| e.is_alive()) {
                continue;
            }
            let action = self.decide(world, ctx, id);
            let outcome = action.execute(world, ctx);
            tracing::trace!(actor = %id, action = action.name(), status = %outcome.status, "ai acted");
            results.push((id, outcome));
        }
        results
    }

    /// 靠近目标：相邻则攻击，否则沿路径走一步，无路可走时直接朝目标方向挪动
    fn approach(&self, world: &WorldState, actor: EntityId, from: Pos, target: EntityId, to: Pos) -> Action {
        if chebyshev(from, to) == 1 {
            return Action::Attack(AttackAction::new(actor, target));
        }
        if let Some(step) = self.step_towards(world, actor, from, to, Some(target)) {
            return step;
        }
        Action::Wait(WaitAction { actor })
    }

    fn step_towards(
        &self,
        world: &WorldState,
        actor: EntityId,
        from: Pos,
        to: Pos,
        target: Option<EntityId>,
    ) -> Option<Action> {
        let path = self.pathfinder.find_path_avoiding(&world.level, from, to, |p| {
            world.blocker_at(p).is_some_and(|b| Some(b) != target && b != actor)
        });
        let next = match path.as_deref() {
            Some([first, ..]) => Some(*first),
            _ => {
                let greedy = (from.0 + (to.0 - from.0).signum(), from.1 + (to.1 - from.1).signum());
                (greedy != from && world.is_free(greedy)).then_some(greedy)
            }
        }?;
        if next != to && !world.is_free(next) {
            return None;
        }
        Some(Action::Move(MoveAction::new(actor, next.0 - from.0, next.1 - from.1)))
    }

    /// 选择让与威胁距离最大的相邻格，不比当前更远时原地等待
    fn flee(&self, world: &WorldState, actor: EntityId, from: Pos, threat: Pos) -> Action {
        let current = distance_squared(from, threat);
        let best = neighbor_offsets(Connectivity::Eight)
            .into_iter()
            .map(|(dx, dy)| (from.0 + dx, from.1 + dy))
            .filter(|&p| world.is_free(p))
            .map(|p| (distance_squared(p, threat), p))
            .fold(None, |best: Option<(i32, Pos)>, cand| match best {
                Some(b) if b.0 >= cand.0 => Some(b),
                _ => Some(cand),
            });
        match best {
            Some((dist, p)) if dist > current => Action::Move(MoveAction::new(actor, p.0 - from.0, p.1 - from.1)),
            _ => Action::Wait(WaitAction { actor }),
        }
    }

    /// 随机走到一个空闲的相邻格
    fn wander(&self, world: &mut WorldState, actor: EntityId, from: Pos) -> Action {
        let options: Vec<Pos> = neighbor_offsets(Connectivity::Eight)
            .into_iter()
            .filter(|&(dx, dy)| world.is_free((from.0 + dx, from.1 + dy)))
            .collect();
        match world.rng.choose(&options) {
            Some(&(dx, dy)) => Action::Move(MoveAction::new(actor, dx, dy)),
            None => Action::Wait(WaitAction { actor }),
        }
    }
}

/// 视野内的存活玩家
fn visible_player(world: &WorldState, from: Pos, range: i32) -> Option<(EntityId, Pos)> {
    let player = &world.player;
    let pos = player.position?;
    (player.is_alive() && chebyshev(from, pos) <= range).then_some((player.id, pos))
}

fn aggressive(engine: &AiEngine, world: &mut WorldState, ctx: &ActionContext, actor: EntityId, pos: Pos) -> Action {
    match visible_player(world, pos, ctx.config.ai.sight_range) {
        Some((target, target_pos)) => engine.approach(world, actor, pos, target, target_pos),
        None => Action::Wait(WaitAction { actor }),
    }
}

fn defensive(engine: &AiEngine, world: &mut WorldState, ctx: &ActionContext, actor: EntityId, pos: Pos) -> Action {
    let wounded = world
        .get(actor)
        .is_some_and(|e| e.hp_fraction() < ctx.config.ai.flee_hp_fraction);
    match visible_player(world, pos, ctx.config.ai.sight_range) {
        Some((_, threat)) if wounded => engine.flee(world, actor, pos, threat),
        _ => aggressive(engine, world, ctx, actor, pos),
    }
}

fn passive(engine: &AiEngine, world: &mut WorldState, ctx: &ActionContext, actor: EntityId, pos: Pos) -> Action {
    let provoked = world.get(actor).and_then(|e| e.ai).is_some_and(|ai| ai.provoked);
    if provoked {
        aggressive(engine, world, ctx, actor, pos)
    } else {
        engine.wander(world, actor, pos)
    }
}

fn coward(engine: &AiEngine, world: &mut WorldState, ctx: &ActionContext, actor: EntityId, pos: Pos) -> Action {
    match visible_player(world, pos, ctx.config.ai.coward_range) {
        Some((_, threat)) => engine.flee(world, actor, pos, threat),
        None => engine.wander(world, actor, pos),
    }
}

fn guard(engine: &AiEngine, world: &mut WorldState, ctx: &ActionContext, actor: EntityId, pos: Pos) -> Action {
    let Some(spawn) = world.get(actor).and_then(|e| e.ai).map(|ai| ai.spawn) else {
        return Action::Wait(WaitAction { actor });
    };
    let player = &world.player;
    if let Some(target_pos) = player.position.filter(|_| player.is_alive()) {
        if chebyshev(spawn, target_pos) <= ctx.config.ai.guard_leash_radius {
            return engine.approach(world, actor, pos, player.id, target_pos);
        }
    }
    if pos != spawn {
        if let Some(step) = engine.step_towards(world, actor, pos, spawn, None) {
            return step;
        }
    }
    Action::Wait(WaitAction { actor })
}
