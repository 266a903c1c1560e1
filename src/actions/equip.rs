use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EquipSlot, attr_map};
use crate::event_bus::EventKind;
use crate::world::WorldState;

use super::{ActionContext, ActionError, ActionHandler, Outcome, Rejection};

/// 装备背包中的物品，原槽位物品回到背包。不消耗回合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipAction {
    pub actor: EntityId,
    pub item: EntityId,
}

impl EquipAction {
    pub fn new(actor: EntityId, item: EntityId) -> Self {
        Self { actor, item }
    }
}

impl ActionHandler for EquipAction {
    fn name(&self) -> &'static str {
        "equip"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, _ctx: &ActionContext) -> Result<(), Rejection> {
        let actor = world
            .get(self.actor)
            .filter(|a| a.is_alive())
            .ok_or_else(|| Rejection::invalid(format!("Actor {} cannot act.", self.actor)))?;
        if !actor.inventory.contains(&self.item) {
            return Err(Rejection::invalid("You are not carrying that."));
        }
        let item = world
            .get(self.item)
            .ok_or_else(|| Rejection::invalid(format!("Item {} does not exist.", self.item)))?;
        if item.slot().is_none() {
            return Err(Rejection::invalid(format!("The {} cannot be equipped.", item.name)));
        }
        Ok(())
    }

    fn execute(&self, world: &mut WorldState, _ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let item = world.get(self.item).ok_or(ActionError::MissingEntity(self.item))?;
        let slot = item
            .slot()
            .ok_or_else(|| ActionError::Inconsistent(format!("{} lost its slot", self.item)))?;
        let name = item.name.clone();

        let actor = world.get_mut(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
        actor.inventory.retain(|id| *id != self.item);
        let previous = actor.equipment.set(slot, Some(self.item));
        if let Some(prev) = previous {
            actor.inventory.push(prev);
        }

        let mut outcome = Outcome::success(false)
            .message(format!("You equip the {name}."))
            .event(
                EventKind::ItemEquipped,
                attr_map([
                    ("entity", self.actor.into()),
                    ("item", self.item.into()),
                    ("slot", slot.to_string().into()),
                ]),
            );
        if let Some(prev) = previous {
            let prev_name = world.get(prev).map_or_else(|| prev.to_string(), |e| e.name.clone());
            outcome.push_message(format!("You stow the {prev_name}."));
            outcome.push_event(
                EventKind::ItemUnequipped,
                attr_map([
                    ("entity", self.actor.into()),
                    ("item", prev.into()),
                    ("slot", slot.to_string().into()),
                ]),
            );
        }
        Ok(outcome)
    }
}

/// 卸下装备放回背包。背包已满时失败。不消耗回合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnequipAction {
    pub actor: EntityId,
    pub slot: EquipSlot,
}

impl UnequipAction {
    pub fn new(actor: EntityId, slot: EquipSlot) -> Self {
        Self { actor, slot }
    }
}

impl ActionHandler for UnequipAction {
    fn name(&self) -> &'static str {
        "unequip"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, ctx: &ActionContext) -> Result<(), Rejection> {
        let actor = world
            .get(self.actor)
            .filter(|a| a.is_alive())
            .ok_or_else(|| Rejection::invalid(format!("Actor {} cannot act.", self.actor)))?;
        if actor.equipment.get(self.slot).is_none() {
            return Err(Rejection::invalid(format!("Nothing is equipped as {}.", self.slot)));
        }
        if actor.inventory.len() >= ctx.config.inventory_capacity {
            return Err(Rejection::failure("Your pack is full."));
        }
        Ok(())
    }

    fn execute(&self, world: &mut WorldState, _ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let actor = world.get_mut(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
        let item = actor
            .equipment
            .set(self.slot, None)
            .ok_or_else(|| ActionError::Inconsistent(format!("{} slot emptied", self.slot)))?;
        actor.inventory.push(item);
        let name = world.get(item).map_or_else(|| item.to_string(), |e| e.name.clone());

        Ok(Outcome::success(false)
            .message(format!("You remove the {name}."))
            .event(
                EventKind::ItemUnequipped,
                attr_map([
                    ("entity", self.actor.into()),
                    ("item", item.into()),
                    ("slot", self.slot.to_string().into()),
                ]),
            ))
    }
}
