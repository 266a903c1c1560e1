//! 无界面演示：用简单的自动策略跑一局，打印消息日志与结果。
//!
//! 用法：`deepforge [seed] [max_turns]`，种子可以是数字或任意文本。

use anyhow::{Context, Result};
use dungeon::pathfinding::chebyshev;
use dungeon::{Pathfinder, Pos, SeedInput};
use tracing_subscriber::EnvFilter;

use deepforge::actions::{AttackAction, CraftAction, DescendAction, EquipAction, MineAction, MoveAction, WaitAction};
use deepforge::entity::keys;
use deepforge::{Action, EntityKind, SaveData, Session, StepResult};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let seed = match args.next() {
        Some(text) => match text.parse::<u64>() {
            Ok(n) => SeedInput::Int(n),
            Err(_) => SeedInput::Text(text),
        },
        None => SeedInput::Random,
    };
    let max_turns: u64 = match args.next() {
        Some(text) => text.parse().context("max_turns must be a number")?,
        None => 2_000,
    };

    let mut session = Session::with_defaults(seed).context("failed to start session")?;
    let pathfinder = Pathfinder::new(session.config.pathfinding.clone());
    println!("seed {} | {}x{} | floor 1", session.world.seed, session.world.level.width, session.world.level.height);

    while !session.is_over() && session.world.turn < max_turns {
        let action = choose_action(&session, &pathfinder);
        let mut step = session.submit(action);
        if !step.outcome.turn_consumed && !step.outcome.is_success() {
            // 自动策略卡住时等一回合，避免死循环
            step = session.submit(Action::Wait(WaitAction {
                actor: session.world.player_id(),
            }));
        }
        print_step(session.world.turn, &step);
    }
    for message in session.world.messages.recent(3) {
        println!("       {message}");
    }

    let world = &session.world;
    println!(
        "finished: turn {} floor {} hp {}/{} victory={} over={}",
        world.turn,
        world.floor,
        world.player.hp(),
        world.player.max_hp(),
        world.victory,
        world.game_over
    );
    let bytes = SaveData::capture(world).to_bytes()?;
    println!("save snapshot: {} bytes, {} events published", bytes.len(), session.bus.published_count());
    Ok(())
}

fn print_step(turn: u64, step: &StepResult) {
    let ai_messages = step
        .turn
        .iter()
        .flat_map(|report| report.ai_outcomes.iter())
        .flat_map(|(_, outcome)| outcome.messages.iter());
    for message in step.outcome.messages.iter().chain(ai_messages) {
        println!("[{turn:>4}] {message}");
    }
}

/// 优先级：攻击相邻敌人 > 制作并装备 > 挖相邻矿脉 > 走向矿脉 > 走向楼梯并下楼
fn choose_action(session: &Session, pathfinder: &Pathfinder) -> Action {
    let world = &session.world;
    let me = world.player_id();
    let Some(pos) = world.player.position else {
        return Action::Wait(WaitAction { actor: me });
    };
    let ctx = session.context();

    if let Some(enemy) = world
        .entities()
        .find(|e| e.kind == EntityKind::Monster && e.is_alive() && e.position.is_some_and(|p| chebyshev(p, pos) == 1))
    {
        return Action::Attack(AttackAction::new(me, enemy.id));
    }

    for recipe in session.content.recipes.keys() {
        let craft = Action::Craft(CraftAction::new(me, recipe));
        if craft.validate(world, &ctx) {
            return craft;
        }
    }

    if let Some(upgrade) = best_upgrade(session) {
        return Action::Equip(EquipAction::new(me, upgrade));
    }

    let pack_full = world.player.inventory.len() >= session.config.inventory_capacity;
    if !pack_full {
        if let Some(vein) = world
            .entities()
            .find(|e| e.kind == EntityKind::OreVein && e.position.is_some_and(|p| chebyshev(p, pos) == 1))
        {
            return Action::Mine(MineAction::new(me, vein.id));
        }
    }

    let targets: Vec<Pos> = if pack_full {
        Vec::new()
    } else {
        world
            .entities()
            .filter(|e| e.kind == EntityKind::OreVein)
            .filter_map(|e| e.position)
            .collect()
    };
    let goal = targets
        .into_iter()
        .min_by_key(|&t| chebyshev(t, pos))
        .or(world.level.stair_down());

    if goal == Some(pos) {
        return Action::Descend(DescendAction { actor: me });
    }
    let step = goal.and_then(|g| pathfinder.find_path(&world.level, pos, g)).and_then(|p| p.first().copied());
    match step {
        Some(next) => Action::Move(MoveAction::new(me, next.0 - pos.0, next.1 - pos.1)),
        None => Action::Wait(WaitAction { actor: me }),
    }
}

/// 背包中比当前装备更好的物品
fn best_upgrade(session: &Session) -> Option<deepforge::EntityId> {
    let world = &session.world;
    let score = |id| {
        world.get(id).map_or(0, |e| {
            e.attr_i64(keys::ATTACK_BONUS).unwrap_or(0) + e.attr_i64(keys::DEFENSE_BONUS).unwrap_or(0)
        })
    };
    world.player.inventory.iter().copied().find(|&id| {
        let Some(slot) = world.get(id).and_then(|e| e.slot()) else {
            return false;
        };
        let current = world.player.equipment.get(slot).map_or(0, score);
        score(id) > current
    })
}
