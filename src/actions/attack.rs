use dungeon::pathfinding::chebyshev;
use serde::{Deserialize, Serialize};

use crate::config::{CombatConfig, LootMode};
use crate::entity::{Entity, EntityId, attr_map, keys};
use crate::event_bus::EventKind;
use crate::world::WorldState;

use super::{ActionContext, ActionError, ActionHandler, Outcome, Rejection, living_actor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackAction {
    pub actor: EntityId,
    pub target: EntityId,
}

impl AttackAction {
    pub fn new(actor: EntityId, target: EntityId) -> Self {
        Self { actor, target }
    }
}

/// 伤害 = max(min_damage, round(formula(attack, defense)))
pub fn compute_damage(config: &CombatConfig, attack: i32, defense: i32) -> i32 {
    let raw = config.damage_formula.evaluate_with(|name| match name {
        "attack" => Some(attack as f64),
        "defense" => Some(defense as f64),
        _ => None,
    });
    (raw.round() as i32).max(config.min_damage)
}

/// 基础攻击加上装备加成
pub fn effective_attack(world: &WorldState, id: EntityId) -> i32 {
    equipment_bonus(world, id, keys::ATTACK_BONUS) + world.get(id).map_or(0, |e| e.attack)
}

pub fn effective_defense(world: &WorldState, id: EntityId) -> i32 {
    equipment_bonus(world, id, keys::DEFENSE_BONUS) + world.get(id).map_or(0, |e| e.defense)
}

fn equipment_bonus(world: &WorldState, id: EntityId, key: &str) -> i32 {
    let Some(entity) = world.get(id) else {
        return 0;
    };
    entity
        .equipment
        .items()
        .filter_map(|item| world.get(item))
        .filter_map(|item| item.attr_i64(key))
        .sum::<i64>() as i32
}

impl ActionHandler for AttackAction {
    fn name(&self) -> &'static str {
        "attack"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, _ctx: &ActionContext) -> Result<(), Rejection> {
        let attacker = living_actor(world, self.actor)?;
        if self.target == self.actor {
            return Err(Rejection::invalid("You cannot attack yourself."));
        }
        let target = world
            .get(self.target)
            .ok_or_else(|| Rejection::invalid(format!("Target {} does not exist.", self.target)))?;
        if !target.is_alive() {
            return Err(Rejection::invalid(format!("The {} is already dead.", target.name)));
        }
        if !target.attackable {
            return Err(Rejection::invalid(format!("The {} cannot be attacked.", target.name)));
        }
        match (attacker.position, target.position) {
            (Some(a), Some(t)) if chebyshev(a, t) == 1 => Ok(()),
            _ => Err(Rejection::invalid(format!("The {} is out of reach.", target.name))),
        }
    }

    fn execute(&self, world: &mut WorldState, ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let attack = effective_attack(world, self.actor);
        let defense = effective_defense(world, self.target);
        let damage = compute_damage(&ctx.config.combat, attack, defense);

        let attacker = world.get(self.actor).ok_or(ActionError::MissingEntity(self.actor))?;
        let attacker_name = attacker.name.clone();
        let attacker_is_player = attacker.is_player();

        let target = world.get_mut(self.target).ok_or(ActionError::MissingEntity(self.target))?;
        let dealt = target.take_damage(damage);
        if let Some(ai) = target.ai.as_mut() {
            ai.provoked = true;
        }
        let target_name = target.name.clone();
        let remaining = target.hp();
        let killed = !target.is_alive();
        let target_is_player = target.is_player();
        let xp_value = target.attr_i64(keys::XP_VALUE).unwrap_or(0);
        let loot_table = target.attr_str(keys::LOOT_TABLE).map(str::to_string);
        let death_pos = target.position;

        let mut outcome = Outcome::success(true)
            .message(format!("{attacker_name} hits {target_name} for {dealt} damage."))
            .event(
                EventKind::DamageDealt,
                attr_map([
                    ("attacker", self.actor.into()),
                    ("target", self.target.into()),
                    ("damage", dealt.into()),
                    ("remaining_hp", remaining.into()),
                ]),
            );

        if killed {
            tracing::debug!(target = %self.target, killer = %self.actor, "entity died");
            outcome.push_message(if target_is_player {
                "You die...".to_string()
            } else {
                format!("{target_name} dies.")
            });
            outcome.push_event(
                EventKind::EntityDied,
                attr_map([
                    ("entity", self.target.into()),
                    ("name", target_name.into()),
                    ("killer", self.actor.into()),
                ]),
            );

            if attacker_is_player && !target_is_player {
                if xp_value > 0 {
                    grant_experience(world, ctx, self.actor, xp_value, &mut outcome);
                }
                if let (Some(table), Some(pos)) = (loot_table, death_pos) {
                    drop_loot(world, ctx, &table, pos, &mut outcome)?;
                }
            }
        }
        Ok(outcome)
    }
}

/// 经验与升级。每次升级恢复满血
pub(crate) fn grant_experience(
    world: &mut WorldState,
    ctx: &ActionContext,
    id: EntityId,
    amount: i64,
    outcome: &mut Outcome,
) {
    let combat = &ctx.config.combat;
    let Some(entity) = world.get_mut(id) else {
        return;
    };
    let mut level = entity.attr_i64(keys::LEVEL).unwrap_or(1).max(1);
    let mut experience = entity.attr_i64(keys::EXPERIENCE).unwrap_or(0) + amount;
    outcome.push_event(
        EventKind::ExperienceGained,
        attr_map([("entity", id.into()), ("amount", amount.into())]),
    );

    let base = combat.level_xp_base.max(1);
    while experience >= base * level {
        experience -= base * level;
        level += 1;
        let max_hp = entity.max_hp() + combat.level_hp_gain;
        entity.set_max_hp(max_hp);
        entity.attack += combat.level_attack_gain;
        entity.defense += combat.level_defense_gain;
        entity.restore_full();
        outcome.push_message(format!("{} reaches level {level}!", entity.name));
        outcome.push_event(EventKind::LevelUp, attr_map([("entity", id.into()), ("level", level.into())]));
    }
    entity.set_attr(keys::LEVEL, level);
    entity.set_attr(keys::EXPERIENCE, experience);
}

/// 掉落。共享模式掷一次骰，放在死亡位置；
/// 独立模式为每个存活的玩家分别掷骰，直接进入各自背包(满了则落地)
fn drop_loot(
    world: &mut WorldState,
    ctx: &ActionContext,
    table_id: &str,
    pos: (i32, i32),
    outcome: &mut Outcome,
) -> Result<(), ActionError> {
    let table = ctx.content.loot_table(table_id)?;

    if ctx.config.combat.loot_mode == LootMode::Shared {
        let dropped: Vec<String> = table.roll(&mut world.rng).into_iter().map(str::to_string).collect();
        for item_id in dropped {
            let item = ctx.content.item(&item_id)?.instantiate();
            drop_on_ground(world, item, pos, outcome);
        }
        return Ok(());
    }

    let recipients: Vec<EntityId> = world
        .all_entities()
        .filter(|e| e.is_player() && e.is_alive())
        .map(|e| e.id)
        .collect();
    for recipient in recipients {
        let dropped: Vec<String> = table.roll(&mut world.rng).into_iter().map(str::to_string).collect();
        for item_id in dropped {
            let item = ctx.content.item(&item_id)?.instantiate();
            let room_in_pack = world
                .get(recipient)
                .is_some_and(|r| r.inventory.len() < ctx.config.inventory_capacity);
            if !room_in_pack {
                drop_on_ground(world, item, pos, outcome);
                continue;
            }
            let name = item.name.clone();
            let id = world.spawn(item);
            let Some(holder) = world.get_mut(recipient) else {
                continue;
            };
            holder.inventory.push(id);
            let who = holder.name.clone();
            if recipient == world.player_id() {
                outcome.push_message(format!("You collect the {name}."));
            } else {
                outcome.push_message(format!("{who} collects the {name}."));
            }
            outcome.push_event(
                EventKind::ItemPickedUp,
                attr_map([("entity", recipient.into()), ("item", id.into())]),
            );
        }
    }
    Ok(())
}

fn drop_on_ground(world: &mut WorldState, item: Entity, pos: (i32, i32), outcome: &mut Outcome) {
    let name = item.name.clone();
    let id = world.spawn(item.at(pos));
    outcome.push_message(format!("The {name} falls to the ground."));
    outcome.push_event(
        EventKind::LootDropped,
        attr_map([("item", id.into()), ("x", pos.0.into()), ("y", pos.1.into())]),
    );
}
