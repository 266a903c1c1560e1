use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind, attr_map};
use crate::event_bus::EventKind;
use crate::world::WorldState;

use super::{
    Action, ActionContext, ActionError, ActionHandler, AttackAction, MineAction, Outcome, Rejection, hostile,
    living_actor,
};

/// 单步移动。撞上敌人转为攻击，玩家撞上矿脉转为挖矿
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAction {
    pub actor: EntityId,
    pub dx: i32,
    pub dy: i32,
}

impl MoveAction {
    pub fn new(actor: EntityId, dx: i32, dy: i32) -> Self {
        Self { actor, dx, dy }
    }
}

impl ActionHandler for MoveAction {
    fn name(&self) -> &'static str {
        "move"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, _ctx: &ActionContext) -> Result<(), Rejection> {
        let actor = living_actor(world, self.actor)?;
        if self.dx.abs() > 1 || self.dy.abs() > 1 || (self.dx == 0 && self.dy == 0) {
            return Err(Rejection::invalid("Movement must be a single step."));
        }
        let Some((x, y)) = actor.position else {
            return Err(Rejection::invalid("Actor is not on the map."));
        };
        let (nx, ny) = (x + self.dx, y + self.dy);
        if !world.level.in_bounds(nx, ny) {
            return Err(Rejection::blocked("You cannot leave the map."));
        }
        if !world.level.is_walkable(nx, ny) {
            return Err(Rejection::blocked("The way is blocked."));
        }
        Ok(())
    }

    fn execute(&self, world: &mut WorldState, ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let actor = world.get(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
        let from = actor
            .position
            .ok_or_else(|| ActionError::Inconsistent(format!("{} has no position", self.actor)))?;
        let is_player = actor.is_player();
        let to = (from.0 + self.dx, from.1 + self.dy);

        if let Some(occupant) = world.blocker_at(to).filter(|&id| id != self.actor) {
            if hostile(world, self.actor, occupant) {
                let attack = Action::Attack(AttackAction::new(self.actor, occupant));
                return Ok(attack.execute(world, ctx));
            }
            let occupant = world.get(occupant).ok_or(ActionError::MissingEntity(occupant))?;
            if is_player && occupant.kind == EntityKind::OreVein {
                let mine = Action::Mine(MineAction::new(self.actor, occupant.id));
                return Ok(mine.execute(world, ctx));
            }
            return Ok(Outcome::blocked(format!("The {} is in the way.", occupant.name)));
        }

        let actor = world.get_mut(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
        actor.position = Some(to);
        let mut outcome = Outcome::success(true).event(
            EventKind::EntityMoved,
            attr_map([
                ("entity", self.actor.into()),
                ("from_x", from.0.into()),
                ("from_y", from.1.into()),
                ("to_x", to.0.into()),
                ("to_y", to.1.into()),
            ]),
        );

        if is_player {
            world.level.reveal_around(to.0, to.1, ctx.config.fov_radius);
            pick_up_items(world, ctx, self.actor, &mut outcome);
        }
        Ok(outcome)
    }
}

/// 自动拾取脚下符合配置类型的物品
fn pick_up_items(world: &mut WorldState, ctx: &ActionContext, actor: EntityId, outcome: &mut Outcome) {
    let Some(pos) = world.get(actor).and_then(|a| a.position) else {
        return;
    };
    let items: Vec<EntityId> = world
        .entities_at(pos)
        .filter(|e| e.kind == EntityKind::Item && ctx.config.autopickup.picks_up(e.item_type()))
        .map(|e| e.id)
        .collect();

    for item in items {
        let carried = world.get(actor).map_or(0, |a| a.inventory.len());
        if carried >= ctx.config.inventory_capacity {
            outcome.push_message("Your pack is full.");
            break;
        }
        let Some(entity) = world.get_mut(item) else {
            continue;
        };
        entity.position = None;
        let name = entity.name.clone();
        if let Some(holder) = world.get_mut(actor) {
            holder.inventory.push(item);
        }
        outcome.push_message(format!("You pick up the {name}."));
        outcome.push_event(
            EventKind::ItemPickedUp,
            attr_map([("entity", actor.into()), ("item", item.into())]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::OutcomeStatus;
    use crate::actions::HookRegistry;
    use crate::config::SimConfig;
    use crate::content::ContentRegistry;
    use crate::entity::Entity;
    use dungeon::{Level, SeededRng, TileKind};

    fn arena() -> WorldState {
        let mut level = Level::filled(7, 7, 1);
        for y in 1..6 {
            for x in 1..6 {
                level.set_kind(x, y, TileKind::Floor);
            }
        }
        let player = Entity::player("p", 20, 5, 2).at((2, 2));
        WorldState::new(SeededRng::new(3), level, player, 50)
    }

    #[test]
    fn move_rules() {
        let content = ContentRegistry::builtin();
        let config = SimConfig::default();
        let hooks = HookRegistry::default();
        let ctx = ActionContext {
            content: &content,
            config: &config,
            hooks: &hooks,
        };
        let mut world = arena();
        let p = world.player_id();

        let out = Action::Move(MoveAction::new(p, 2, 0)).execute(&mut world, &ctx);
        assert_eq!(out.status, OutcomeStatus::Invalid);
        assert!(!out.turn_consumed);

        let out = Action::Move(MoveAction::new(p, -1, -1)).execute(&mut world, &ctx);
        assert!(out.is_success());
        assert_eq!(world.player.position, Some((1, 1)));

        let out = Action::Move(MoveAction::new(p, -1, 0)).execute(&mut world, &ctx);
        assert_eq!(out.status, OutcomeStatus::Blocked);
        assert!(!out.turn_consumed);
        assert_eq!(world.player.position, Some((1, 1)));
    }

    #[test]
    fn walking_onto_ore_picks_it_up() {
        let content = ContentRegistry::builtin();
        let config = SimConfig::default();
        let hooks = HookRegistry::default();
        let ctx = ActionContext {
            content: &content,
            config: &config,
            hooks: &hooks,
        };
        let mut world = arena();
        let ore = world.spawn(Entity::item("copper ore", "ore").at((3, 2)));
        let sword = world.spawn(Entity::item("sword", "weapon").at((3, 2)));
        let p = world.player_id();
        let out = Action::Move(MoveAction::new(p, 1, 0)).execute(&mut world, &ctx);
        assert!(out.has_event(EventKind::ItemPickedUp));
        assert_eq!(world.player.inventory, vec![ore]);
        assert_eq!(world.get(sword).unwrap().position, Some((3, 2)));
    }
}
