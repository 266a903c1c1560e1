use dungeon::pathfinding::chebyshev;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind, attr_map, keys};
use crate::event_bus::EventKind;
use crate::formula::FormulaInputs;
use crate::world::WorldState;

use super::{ActionContext, ActionError, ActionHandler, Outcome, Rejection, living_actor};

/// 在熔炉旁消耗矿石制作装备。属性由配方公式根据所耗矿石的平均品质计算
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftAction {
    pub actor: EntityId,
    pub recipe: String,
}

impl CraftAction {
    pub fn new(actor: EntityId, recipe: &str) -> Self {
        Self {
            actor,
            recipe: recipe.to_string(),
        }
    }
}

/// 背包中匹配资源类型的物品，按背包顺序
fn matching_resources(world: &WorldState, actor: &Entity, resource: &str) -> Vec<EntityId> {
    actor
        .inventory
        .iter()
        .copied()
        .filter(|id| world.get(*id).is_some_and(|item| item.resource_type() == Some(resource)))
        .collect()
}

fn near_forge(world: &WorldState, actor: &Entity) -> bool {
    let Some(pos) = actor.position else {
        return false;
    };
    world
        .entities()
        .filter(|e| e.kind == EntityKind::Forge)
        .filter_map(|e| e.position)
        .any(|forge| chebyshev(pos, forge) <= 1)
}

/// 对所耗物品的品质逐项求平均，缺失项按 0 计
fn average_qualities(world: &WorldState, items: &[EntityId]) -> FormulaInputs {
    let mut sums = FormulaInputs::new();
    for item in items.iter().filter_map(|id| world.get(*id)) {
        for (name, value) in item.qualities() {
            *sums.entry(name).or_insert(0.0) += value;
        }
    }
    let n = items.len().max(1) as f64;
    sums.into_iter().map(|(k, v)| (k, v / n)).collect()
}

impl ActionHandler for CraftAction {
    fn name(&self) -> &'static str {
        "craft"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, ctx: &ActionContext) -> Result<(), Rejection> {
        let actor = living_actor(world, self.actor)?;
        let recipe = ctx
            .content
            .recipe(&self.recipe)
            .map_err(|_| Rejection::invalid(format!("Unknown recipe `{}`.", self.recipe)))?;
        if !near_forge(world, actor) {
            return Err(Rejection::failure("You need to stand next to a forge."));
        }
        let have = matching_resources(world, actor, &recipe.resource).len();
        if have < recipe.count {
            return Err(Rejection::failure(format!(
                "Not enough {} ore for the {} (have {have}, need {}).",
                recipe.resource, recipe.name, recipe.count
            )));
        }
        Ok(())
    }

    fn execute(&self, world: &mut WorldState, ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let recipe = ctx.content.recipe(&self.recipe)?;
        let actor = world.get(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
        let consumed: Vec<EntityId> = matching_resources(world, actor, &recipe.resource)
            .into_iter()
            .take(recipe.count)
            .collect();
        if consumed.len() < recipe.count {
            return Err(ActionError::Inconsistent(format!(
                "{} lost resources between check and execute",
                self.actor
            )));
        }

        let averages = average_qualities(world, &consumed);
        let mut item = Entity::item(&recipe.output_name, &recipe.item_type).with_content(&recipe.id);
        if let Some(slot) = recipe.slot {
            item.set_attr(keys::SLOT, slot.to_string());
        }
        let mut stats = Vec::new();
        for (stat, formula) in &recipe.stats {
            let value = formula.evaluate(&averages).round() as i64;
            item.set_attr(stat, value);
            stats.push(format!("{stat} {value:+}"));
        }
        for (quality, value) in &averages {
            item.set_quality(quality, *value);
        }

        for id in &consumed {
            world.remove(*id);
        }
        let capacity = ctx.config.inventory_capacity;
        let actor = world.get_mut(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
        actor.inventory.retain(|id| !consumed.contains(id));
        let fits = actor.inventory.len() < capacity;
        let position = actor.position;

        let name = item.name.clone();
        let item_id = if fits {
            let id = world.spawn(item);
            if let Some(actor) = world.get_mut(self.actor) {
                actor.inventory.push(id);
            }
            id
        } else {
            world.spawn(match position {
                Some(pos) => item.at(pos),
                None => item,
            })
        };

        let mut data = attr_map([
            ("entity", self.actor.into()),
            ("item", item_id.into()),
            ("recipe", recipe.id.as_str().into()),
            ("consumed", (consumed.len() as u64).into()),
        ]);
        for (stat, _) in &recipe.stats {
            if let Some(value) = world.get(item_id).and_then(|i| i.attr(stat)) {
                data.insert(stat.clone(), value.clone());
            }
        }

        let mut outcome = Outcome::success(true)
            .message(format!("You forge a {name} ({}).", stats.join(", ")))
            .event(EventKind::ItemCrafted, data);
        if !fits {
            outcome.push_message(format!("Your pack is full; the {name} rests by the forge."));
        }
        Ok(outcome)
    }
}
