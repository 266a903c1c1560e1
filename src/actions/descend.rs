use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, attr_map};
use crate::event_bus::EventKind;
use crate::world::WorldState;

use super::{ActionContext, ActionError, ActionHandler, Outcome, Rejection, living_actor};

/// 站在下楼楼梯上时进入下一层。实际换层由会话处理 `FloorTransition` 事件完成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescendAction {
    pub actor: EntityId,
}

impl ActionHandler for DescendAction {
    fn name(&self) -> &'static str {
        "descend"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, _ctx: &ActionContext) -> Result<(), Rejection> {
        let actor = living_actor(world, self.actor)?;
        if !actor.is_player() {
            return Err(Rejection::invalid("Only the player can take the stairs."));
        }
        if world.level.stair_down().is_none() || actor.position != world.level.stair_down() {
            return Err(Rejection::failure("There is no way down here."));
        }
        Ok(())
    }

    fn execute(&self, world: &mut WorldState, _ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let from = world.floor;
        Ok(Outcome::success(true)
            .message(format!("You descend to depth {}.", from + 1))
            .event(
                EventKind::FloorTransition,
                attr_map([
                    ("entity", self.actor.into()),
                    ("from", from.into()),
                    ("to", (from + 1).into()),
                ]),
            ))
    }
}

/// 原地等待一回合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitAction {
    pub actor: EntityId,
}

impl ActionHandler for WaitAction {
    fn name(&self) -> &'static str {
        "wait"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, _ctx: &ActionContext) -> Result<(), Rejection> {
        living_actor(world, self.actor).map(|_| ())
    }

    fn execute(&self, _world: &mut WorldState, _ctx: &ActionContext) -> Result<Outcome, ActionError> {
        Ok(Outcome::success(true))
    }
}
