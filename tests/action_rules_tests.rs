mod helpers;

use deepforge::actions::{
    AttackAction, CraftAction, DescendAction, EquipAction, MineAction, MoveAction, SurveyAction, UnequipAction,
    effective_attack,
};
use deepforge::ai::Behavior;
use deepforge::config::LootMode;
use deepforge::entity::{Entity, EquipSlot, keys};
use deepforge::{Action, EntityKind, EventKind, OutcomeStatus};
use helpers::TestWorldBuilder;
use pretty_assertions::assert_eq;

#[test]
fn attack_deals_attack_minus_defense() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let rat = t.monster("rat", (3, 2), 10, 1, 2, Behavior::Aggressive);

    let out = t.exec(Action::Attack(AttackAction::new(p, rat)));
    assert!(out.is_success());
    assert!(out.turn_consumed);
    assert_eq!(t.world.get(rat).unwrap().hp(), 7);
}

#[test]
fn attacking_out_of_reach_is_invalid_and_changes_nothing() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let rat = t.monster("rat", (5, 5), 10, 1, 2, Behavior::Aggressive);
    let before = t.world.clone();

    let out = t.exec(Action::Attack(AttackAction::new(p, rat)));
    assert_eq!(out.status, OutcomeStatus::Invalid);
    assert!(!out.turn_consumed);
    assert!(out.has_event(EventKind::ActionRejected));
    assert_eq!(t.world, before);
}

#[test]
fn bumping_a_monster_attacks_it() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let rat = t.monster("rat", (3, 3), 10, 1, 0, Behavior::Aggressive);

    let out = t.exec(Action::Move(MoveAction::new(p, 1, 1)));
    assert!(out.has_event(EventKind::DamageDealt));
    assert_eq!(t.world.player.position, Some((2, 2)));
    assert_eq!(t.world.get(rat).unwrap().hp(), 5);
}

#[test]
fn monsters_do_not_attack_each_other() {
    let mut t = TestWorldBuilder::new(1).build();
    let a = t.monster("a", (5, 5), 10, 3, 0, Behavior::Aggressive);
    let b = t.monster("b", (6, 5), 10, 3, 0, Behavior::Aggressive);

    let out = t.exec(Action::Move(MoveAction::new(a, 1, 0)));
    assert_eq!(out.status, OutcomeStatus::Blocked);
    assert_eq!(t.world.get(b).unwrap().hp(), 10);
    assert_eq!(t.pos_of(a), Some((5, 5)));
}

#[test]
fn walls_and_borders_block_without_consuming_a_turn() {
    let mut t = TestWorldBuilder::new(1).with_player_at((1, 1)).with_wall((2, 1)).build();
    let p = t.player();

    for (dx, dy) in [(1, 0), (-1, 0), (0, -1)] {
        let out = t.exec(Action::Move(MoveAction::new(p, dx, dy)));
        assert_eq!(out.status, OutcomeStatus::Blocked);
        assert!(!out.turn_consumed);
    }
    let out = t.exec(Action::Move(MoveAction::new(p, 0, 0)));
    assert_eq!(out.status, OutcomeStatus::Invalid);
    assert_eq!(t.world.player.position, Some((1, 1)));
}

#[test]
fn kills_grant_experience_and_level_ups() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let mut goblin = Entity::monster("goblin", 1, 1, 0).at((3, 2));
    goblin.set_attr(keys::XP_VALUE, 25);
    let goblin = t.spawn(goblin);
    t.world.player.take_damage(10);

    let out = t.exec(Action::Attack(AttackAction::new(p, goblin)));
    assert!(out.has_event(EventKind::EntityDied));
    assert!(out.has_event(EventKind::LevelUp));
    assert_eq!(t.world.player.attr_i64(keys::LEVEL), Some(2));
    assert_eq!(t.world.player.attr_i64(keys::EXPERIENCE), Some(5));
    assert_eq!(t.world.player.max_hp(), 35);
    assert_eq!(t.world.player.hp(), 35);
    assert_eq!(t.world.player.attack, 6);
    assert!(!t.world.get(goblin).unwrap().is_alive());
}

#[test]
fn shared_loot_drops_at_the_corpse() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let golem = t.spawn(
        Entity::monster("golem", 1, 1, 0)
            .at((3, 2))
            .with_attr(keys::LOOT_TABLE, "golem"),
    );

    let out = t.exec(Action::Attack(AttackAction::new(p, golem)));
    assert!(out.has_event(EventKind::LootDropped));
    let gold = t
        .world
        .entities()
        .find(|e| e.content_id.as_deref() == Some("gold_coins"))
        .expect("golems always drop gold");
    assert_eq!(gold.position, Some((3, 2)));
}

#[test]
fn per_player_loot_goes_to_the_pack() {
    let mut t = TestWorldBuilder::new(1)
        .configure(|c| c.combat.loot_mode = LootMode::PerPlayer)
        .build();
    let p = t.player();
    let golem = t.spawn(
        Entity::monster("golem", 1, 1, 0)
            .at((3, 2))
            .with_attr(keys::LOOT_TABLE, "golem"),
    );

    let out = t.exec(Action::Attack(AttackAction::new(p, golem)));
    assert!(out.has_event(EventKind::ItemPickedUp));
    assert!(!t.world.player.inventory.is_empty());
    assert!(t.world.check_invariants().is_ok());
}

#[test]
fn per_player_loot_rolls_for_every_player() {
    let mut t = TestWorldBuilder::new(1)
        .configure(|c| c.combat.loot_mode = LootMode::PerPlayer)
        .build();
    let p = t.player();
    let ally = t.spawn(Entity::player("ally", 20, 3, 1).at((8, 8)));
    let golem = t.spawn(
        Entity::monster("golem", 1, 1, 0)
            .at((3, 2))
            .with_attr(keys::LOOT_TABLE, "golem"),
    );

    let out = t.exec(Action::Attack(AttackAction::new(p, golem)));
    let recipients: Vec<_> = out
        .events
        .iter()
        .filter(|e| e.kind == EventKind::ItemPickedUp)
        .filter_map(|e| e.data.get("entity").cloned())
        .collect();
    assert!(recipients.contains(&p.into()));
    assert!(recipients.contains(&ally.into()));

    let gold_in = |id| {
        t.world.get(id).unwrap().inventory.iter().any(|item| {
            t.world.get(*item).and_then(|e| e.content_id.as_deref()) == Some("gold_coins")
        })
    };
    assert!(gold_in(p));
    assert!(gold_in(ally));
    assert!(!out.has_event(EventKind::LootDropped));
    assert!(t.world.check_invariants().is_ok());
}

fn iron_vein(pos: (i32, i32)) -> Entity {
    let mut vein = Entity::ore_vein("iron vein", 3)
        .with_content("iron")
        .with_attr(keys::RESOURCE_TYPE, "iron")
        .at(pos);
    vein.set_quality("purity", 0.6);
    vein.set_quality("density", 0.8);
    vein
}

#[test]
fn mining_takes_exactly_hardness_turns() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let vein = t.spawn(iron_vein((3, 2)));

    for remaining in [2, 1] {
        let out = t.exec(Action::Mine(MineAction::new(p, vein)));
        assert!(out.is_success());
        assert!(out.turn_consumed);
        assert!(t.world.contains(vein));
        assert_eq!(t.world.player.mining.unwrap().turns_remaining, remaining);
    }

    let out = t.exec(Action::Mine(MineAction::new(p, vein)));
    assert!(out.has_event(EventKind::OreMined));
    assert!(!t.world.contains(vein));
    assert!(t.world.player.mining.is_none());
    let ore = t.world.get(t.world.player.inventory[0]).unwrap();
    assert_eq!(ore.resource_type(), Some("iron"));
    assert_eq!(ore.qualities(), vec![("density".to_string(), 0.8), ("purity".to_string(), 0.6)]);
}

#[test]
fn bumping_a_vein_mines_it() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let vein = t.spawn(iron_vein((2, 3)));

    let out = t.exec(Action::Move(MoveAction::new(p, 0, 1)));
    assert!(out.has_event(EventKind::MiningStarted));
    assert_eq!(t.world.player.position, Some((2, 2)));
    assert_eq!(t.world.player.mining.unwrap().vein, vein);
}

#[test]
fn switching_veins_restarts_progress() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let first = t.spawn(iron_vein((3, 2)));
    let second = t.spawn(iron_vein((1, 2)));

    t.exec(Action::Mine(MineAction::new(p, first)));
    t.exec(Action::Mine(MineAction::new(p, second)));
    let progress = t.world.player.mining.unwrap();
    assert_eq!(progress.vein, second);
    assert_eq!(progress.turns_remaining, 2);
}

#[test]
fn survey_reports_qualities() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let vein = t.spawn(iron_vein((3, 3)));

    let out = t.exec(Action::Survey(SurveyAction::new(p, vein)));
    assert!(out.has_event(EventKind::VeinSurveyed));
    assert!(out.messages[0].contains("purity 0.60"));
    assert!(t.world.get(vein).unwrap().attr_bool(keys::SURVEYED));
}

#[test]
fn crafting_needs_a_forge_and_enough_ore() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    for purity in [0.5, 0.7] {
        t.give_ore("iron", &[("purity", purity), ("density", 0.8)]);
    }

    let out = t.exec(Action::Craft(CraftAction::new(p, "iron_sword")));
    assert_eq!(out.status, OutcomeStatus::Failure);
    assert!(out.messages[0].contains("forge"));

    t.spawn(Entity::forge().at((3, 3)));
    let out = t.exec(Action::Craft(CraftAction::new(p, "iron_sword")));
    assert_eq!(out.status, OutcomeStatus::Failure);
    assert_eq!(t.world.player.inventory.len(), 2);

    let out = t.exec(Action::Craft(CraftAction::new(p, "no_such_recipe")));
    assert_eq!(out.status, OutcomeStatus::Invalid);
}

#[test]
fn crafting_averages_ore_qualities() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    t.spawn(Entity::forge().at((3, 3)));
    let mut ores = Vec::new();
    for purity in [0.5, 0.7, 0.6] {
        ores.push(t.give_ore("iron", &[("purity", purity), ("density", 0.8)]));
    }
    let copper = t.give_ore("copper", &[("purity", 0.9)]);

    let out = t.exec(Action::Craft(CraftAction::new(p, "iron_sword")));
    assert!(out.is_success());
    assert!(out.has_event(EventKind::ItemCrafted));
    for ore in ores {
        assert!(!t.world.contains(ore));
    }
    assert_eq!(t.world.player.inventory.len(), 2);
    assert_eq!(t.world.player.inventory[0], copper);

    // 2 + 4 × 0.6 + 0.8 = 5.2
    let sword = t.world.get(t.world.player.inventory[1]).unwrap();
    assert_eq!(sword.name, "iron sword");
    assert_eq!(sword.attr_i64(keys::ATTACK_BONUS), Some(5));
    assert_eq!(sword.slot(), Some(EquipSlot::Weapon));
}

#[test]
fn equipping_swaps_and_does_not_consume_a_turn() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    let dagger = t.spawn(
        Entity::item("dagger", "weapon")
            .with_attr(keys::SLOT, "weapon")
            .with_attr(keys::ATTACK_BONUS, 1),
    );
    let sword = t.spawn(
        Entity::item("sword", "weapon")
            .with_attr(keys::SLOT, "weapon")
            .with_attr(keys::ATTACK_BONUS, 3),
    );
    t.world.player.inventory.extend([dagger, sword]);

    let out = t.exec(Action::Equip(EquipAction::new(p, dagger)));
    assert!(out.is_success());
    assert!(!out.turn_consumed);
    assert_eq!(effective_attack(&t.world, p), 6);

    let out = t.exec(Action::Equip(EquipAction::new(p, sword)));
    assert!(out.has_event(EventKind::ItemUnequipped));
    assert_eq!(t.world.player.equipment.weapon, Some(sword));
    assert_eq!(t.world.player.inventory, vec![dagger]);
    assert_eq!(effective_attack(&t.world, p), 8);

    let rock = t.spawn(Entity::item("rock", "junk"));
    t.world.player.inventory.push(rock);
    let out = t.exec(Action::Equip(EquipAction::new(p, rock)));
    assert_eq!(out.status, OutcomeStatus::Invalid);
}

#[test]
fn unequipping_into_a_full_pack_fails() {
    let mut t = TestWorldBuilder::new(1).configure(|c| c.inventory_capacity = 1).build();
    let p = t.player();
    let armor = t.spawn(Entity::item("mail", "armor").with_attr(keys::SLOT, "armor"));
    t.world.player.equipment.armor = Some(armor);
    t.give_ore("iron", &[]);

    let out = t.exec(Action::Unequip(UnequipAction::new(p, EquipSlot::Armor)));
    assert_eq!(out.status, OutcomeStatus::Failure);
    assert_eq!(t.world.player.equipment.armor, Some(armor));

    t.world.player.inventory.clear();
    let out = t.exec(Action::Unequip(UnequipAction::new(p, EquipSlot::Armor)));
    assert!(out.is_success());
    assert!(!out.turn_consumed);
    assert_eq!(t.world.player.inventory, vec![armor]);
}

#[test]
fn descending_requires_standing_on_the_stairs() {
    let mut t = TestWorldBuilder::new(1).with_stairs_down((3, 2)).build();
    let p = t.player();

    let out = t.exec(Action::Descend(DescendAction { actor: p }));
    assert_eq!(out.status, OutcomeStatus::Failure);

    t.exec(Action::Move(MoveAction::new(p, 1, 0)));
    let out = t.exec(Action::Descend(DescendAction { actor: p }));
    assert!(out.is_success());
    assert!(out.has_event(EventKind::FloorTransition));
}

#[test]
fn dead_actors_cannot_act() {
    let mut t = TestWorldBuilder::new(1).build();
    let p = t.player();
    t.world.player.take_damage(1_000);
    let out = t.exec(Action::Move(MoveAction::new(p, 1, 0)));
    assert_eq!(out.status, OutcomeStatus::Invalid);
    assert_eq!(t.world.count_kind(EntityKind::Monster), 0);
}
