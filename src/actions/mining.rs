use dungeon::pathfinding::chebyshev;
use serde::{Deserialize, Serialize};

use crate::config::MiningConfig;
use crate::entity::{AttrMap, Entity, EntityId, EntityKind, MiningProgress, attr_map, keys};
use crate::event_bus::EventKind;
use crate::world::WorldState;

use super::{ActionContext, ActionError, ActionHandler, Outcome, Rejection, effective_attack, living_actor};

/// 挖矿所需回合数，至少为 `min_turns`
pub fn mining_turns(config: &MiningConfig, hardness: i64, attack: i32) -> u32 {
    let raw = config.turns_formula.evaluate_with(|name| match name {
        "hardness" => Some(hardness as f64),
        "attack" => Some(attack as f64),
        _ => None,
    });
    (raw.round().max(0.0) as u32).max(config.min_turns.max(1))
}

fn adjacent_vein<'w>(world: &'w WorldState, actor: &Entity, vein: EntityId) -> Result<&'w Entity, Rejection> {
    let target = world
        .get(vein)
        .filter(|e| e.kind == EntityKind::OreVein)
        .ok_or_else(|| Rejection::invalid(format!("{vein} is not an ore vein.")))?;
    match (actor.position, target.position) {
        (Some(a), Some(v)) if chebyshev(a, v) <= 1 => Ok(target),
        _ => Err(Rejection::invalid(format!("The {} is out of reach.", target.name))),
    }
}

/// 多回合挖矿。第一次调用确定总回合数 T，恰好调用 T 次后矿脉变为矿石
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineAction {
    pub actor: EntityId,
    pub vein: EntityId,
}

impl MineAction {
    pub fn new(actor: EntityId, vein: EntityId) -> Self {
        Self { actor, vein }
    }
}

impl ActionHandler for MineAction {
    fn name(&self) -> &'static str {
        "mine"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, _ctx: &ActionContext) -> Result<(), Rejection> {
        let actor = living_actor(world, self.actor)?;
        if !actor.is_player() {
            return Err(Rejection::invalid("Only the player can mine."));
        }
        adjacent_vein(world, actor, self.vein).map(|_| ())
    }

    fn execute(&self, world: &mut WorldState, ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let attack = effective_attack(world, self.actor);
        let vein = world.get(self.vein).ok_or(ActionError::MissingEntity(self.vein))?;
        let hardness = vein.attr_i64(keys::HARDNESS).unwrap_or(1);
        let vein_name = vein.name.clone();
        let vein_pos = vein.position;

        let actor = world.get(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
        let mut outcome = Outcome::success(true);
        let mut progress = match actor.mining {
            Some(progress) if progress.vein == self.vein => progress,
            _ => {
                let total = mining_turns(&ctx.config.mining, hardness, attack);
                outcome.push_event(
                    EventKind::MiningStarted,
                    attr_map([
                        ("entity", self.actor.into()),
                        ("vein", self.vein.into()),
                        ("turns", total.into()),
                    ]),
                );
                MiningProgress {
                    vein: self.vein,
                    turns_remaining: total,
                    total_turns: total,
                }
            }
        };
        progress.turns_remaining = progress.turns_remaining.saturating_sub(1);

        if progress.turns_remaining > 0 {
            let actor = world.get_mut(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
            actor.mining = Some(progress);
            outcome.push_message(format!(
                "You chip at the {vein_name} ({} turns left).",
                progress.turns_remaining
            ));
            outcome.push_event(
                EventKind::MiningProgressed,
                attr_map([
                    ("entity", self.actor.into()),
                    ("vein", self.vein.into()),
                    ("turns_remaining", progress.turns_remaining.into()),
                ]),
            );
            return Ok(outcome);
        }

        let vein = world.remove(self.vein).ok_or(ActionError::MissingEntity(self.vein))?;
        let ore = ore_from_vein(&vein);
        let ore_name = ore.name.clone();
        let capacity = ctx.config.inventory_capacity;
        let actor = world.get_mut(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
        actor.mining = None;
        let fits = actor.inventory.len() < capacity;

        let ore_id = if fits {
            let id = world.spawn(ore);
            if let Some(actor) = world.get_mut(self.actor) {
                actor.inventory.push(id);
            }
            outcome.push_message(format!("You break the {vein_name} and collect some {ore_name}."));
            id
        } else {
            let ore = match vein_pos {
                Some(pos) => ore.at(pos),
                None => ore,
            };
            outcome.push_message(format!("You break the {vein_name}, but your pack is full."));
            world.spawn(ore)
        };
        outcome.push_event(
            EventKind::OreMined,
            attr_map([
                ("entity", self.actor.into()),
                ("vein", self.vein.into()),
                ("item", ore_id.into()),
            ]),
        );
        Ok(outcome)
    }
}

/// 由矿脉生成矿石物品，继承资源类型与品质
fn ore_from_vein(vein: &Entity) -> Entity {
    let resource = vein.resource_type().or(vein.content_id.as_deref()).unwrap_or("ore");
    let name = vein.name.strip_suffix(" vein").unwrap_or(&vein.name);
    let mut ore = Entity::item(format!("{name} ore"), "ore").with_attr(keys::RESOURCE_TYPE, resource);
    ore.content_id = vein.content_id.clone();
    for (quality, value) in vein.qualities() {
        ore.set_quality(&quality, value);
    }
    ore
}

/// 查看矿脉品质，标记为已勘测
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyAction {
    pub actor: EntityId,
    pub vein: EntityId,
}

impl SurveyAction {
    pub fn new(actor: EntityId, vein: EntityId) -> Self {
        Self { actor, vein }
    }
}

impl ActionHandler for SurveyAction {
    fn name(&self) -> &'static str {
        "survey"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, _ctx: &ActionContext) -> Result<(), Rejection> {
        let actor = living_actor(world, self.actor)?;
        adjacent_vein(world, actor, self.vein).map(|_| ())
    }

    fn execute(&self, world: &mut WorldState, _ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let vein = world.get_mut(self.vein).ok_or(ActionError::MissingEntity(self.vein))?;
        vein.set_attr(keys::SURVEYED, true);
        let qualities = vein.qualities();
        let summary = if qualities.is_empty() {
            "nothing of note".to_string()
        } else {
            qualities
                .iter()
                .map(|(name, value)| format!("{name} {value:.2}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut data: AttrMap = qualities.into_iter().map(|(k, v)| (k, v.into())).collect();
        data.insert("entity".into(), self.actor.into());
        data.insert("vein".into(), self.vein.into());

        Ok(Outcome::success(true)
            .message(format!("The {}: {summary}.", vein.name))
            .event(EventKind::VeinSurveyed, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mining_turns_follow_hardness() {
        let cfg = MiningConfig::default();
        assert_eq!(mining_turns(&cfg, 3, 5), 3);
        assert_eq!(mining_turns(&cfg, 0, 5), 1);
    }

    #[test]
    fn ore_inherits_qualities() {
        let mut vein = Entity::ore_vein("iron vein", 3)
            .with_content("iron")
            .with_attr(keys::RESOURCE_TYPE, "iron");
        vein.set_quality("purity", 0.7);
        let ore = ore_from_vein(&vein);
        assert_eq!(ore.name, "iron ore");
        assert_eq!(ore.resource_type(), Some("iron"));
        assert_eq!(ore.item_type(), Some("ore"));
        assert_eq!(ore.qualities(), vec![("purity".to_string(), 0.7)]);
    }
}
