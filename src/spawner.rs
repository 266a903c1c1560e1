//! 楼层填充：放置玩家、熔炉、怪物、矿脉与宝藏。
//!
//! 所有随机性来自世界随机源，生成顺序固定(房间顺序、实体类型顺序)，
//! 因此相同种子得到相同的实体名单。

use dungeon::{Pos, Room, RoomArchetype};
use error::ContentError;

use crate::config::{SimConfig, weights_for_floor};
use crate::content::ContentRegistry;
use crate::entity::Entity;
use crate::world::WorldState;

/// 把玩家放到本层入口：上楼楼梯，若没有则是第一个房间的中心
pub fn place_player(world: &mut WorldState, config: &SimConfig) {
    let entry = world
        .level
        .stair_up()
        .or_else(|| world.level.rooms.first().map(Room::center))
        .or_else(|| world.level.walkable_cells().next());
    world.player.position = entry;
    world.reveal_from_player(config.fov_radius);
    tracing::debug!(floor = world.floor, entry = ?entry, "player placed");
}

/// 生成本层的全部实体
pub fn populate_floor(
    world: &mut WorldState,
    content: &ContentRegistry,
    config: &SimConfig,
) -> Result<(), ContentError> {
    let spawn = &config.spawn;
    let floor = world.floor;
    let rooms = world.level.rooms.clone();

    if let Some(start) = rooms.first() {
        if floor == 1 && spawn.forge_in_start_room {
            place_forge(world, config, start);
        }
    }

    let monster_weights = weights_for_floor(&spawn.monster_tables, floor);
    for (index, room) in rooms.iter().enumerate().skip(1) {
        let mut count = world.rng.range_i(spawn.monsters_per_room.0 as i64, spawn.monsters_per_room.1 as i64);
        if room.archetype == RoomArchetype::MonsterDen {
            count += world.rng.range_i(spawn.den_extra_monsters.0 as i64, spawn.den_extra_monsters.1 as i64);
        }
        for _ in 0..count {
            let Some((id, _)) = world.rng.choose_weighted(monster_weights, |(_, w)| *w) else {
                return Err(ContentError::EmptyWeightTable(format!("monsters on floor {floor}")));
            };
            let def = content.monster(id)?;
            match free_cell(world, config, room) {
                Some(pos) => {
                    world.spawn(def.instantiate(pos));
                }
                None => tracing::trace!(room = index, monster = %id, "room full, monster skipped"),
            }
        }
    }

    let ore_weights = weights_for_floor(&spawn.ore_tables, floor);
    let mut vein_rooms: Vec<&Room> = Vec::new();
    if rooms.len() > 1 {
        let count = world.rng.range_i(spawn.veins_per_floor.0 as i64, spawn.veins_per_floor.1 as i64);
        for _ in 0..count {
            let index = world.rng.range_i(1, rooms.len() as i64 - 1) as usize;
            vein_rooms.push(&rooms[index]);
        }
    }
    for room in rooms.iter().filter(|r| r.archetype == RoomArchetype::OreChamber) {
        let extra = world.rng.range_i(spawn.chamber_extra_veins.0 as i64, spawn.chamber_extra_veins.1 as i64);
        vein_rooms.extend(std::iter::repeat_n(room, extra.max(0) as usize));
    }
    for room in vein_rooms {
        let Some((id, _)) = world.rng.choose_weighted(ore_weights, |(_, w)| *w) else {
            return Err(ContentError::EmptyWeightTable(format!("ores on floor {floor}")));
        };
        let def = content.ore(id)?;
        if let Some(pos) = free_cell(world, config, room) {
            let vein = def.instantiate(pos, &mut world.rng);
            world.spawn(vein);
        }
    }

    let treasure = content.loot_table(&spawn.treasure_loot_table)?;
    for room in rooms.iter().filter(|r| r.archetype == RoomArchetype::Treasure) {
        let rolls = world.rng.range_i(spawn.treasure_items.0 as i64, spawn.treasure_items.1 as i64);
        for _ in 0..rolls {
            let drops: Vec<String> = treasure.roll(&mut world.rng).into_iter().map(str::to_string).collect();
            for item_id in drops {
                let def = content.item(&item_id)?;
                if let Some(pos) = free_cell(world, config, room) {
                    world.spawn(def.instantiate().at(pos));
                }
            }
        }
    }

    for room in rooms.iter().filter(|r| r.archetype == RoomArchetype::Shrine) {
        place_forge(world, config, room);
    }

    tracing::info!(
        floor,
        rooms = rooms.len(),
        entities = world.entities().count(),
        "floor populated"
    );
    Ok(())
}

fn place_forge(world: &mut WorldState, config: &SimConfig, room: &Room) {
    if let Some(pos) = free_cell(world, config, room) {
        world.spawn(Entity::forge().at(pos));
    }
}

/// 房间内随机找一个没有任何实体、也不在楼梯上的格子
fn free_cell(world: &mut WorldState, config: &SimConfig, room: &Room) -> Option<Pos> {
    for _ in 0..config.spawn.placement_attempts.max(1) {
        let pos = room.random_point(&mut world.rng);
        let on_stairs = world.level.kind_at(pos.0, pos.1).is_some_and(|k| k.is_stair());
        if !on_stairs && world.is_empty_cell(pos) {
            return Some(pos);
        }
    }
    None
}
