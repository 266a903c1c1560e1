// src/dungeon/src/generator.rs
//! BSP 地牢生成器
//!
//! 1. 递归切分整个矩形(BSP)
//! 2. 每个叶子节点挖一个房间
//! 3. 每个内部节点用 L 形走廊连接左右子树
//! 4. 房间与走廊写入瓦片网格
//! 5. 为部分房间分配特殊类型
//! 6. 放置楼梯并缓存坐标

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::level::{Corridor, Level, Pos, Room, RoomArchetype, TileKind};
use crate::rng::SeededRng;

/// 生成参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// 叶子节点的最小边长，低于此值停止切分
    pub min_leaf_size: i32,
    /// 宽高比超过此值时强制沿长边切分
    pub max_aspect_ratio: f64,
    /// 切分位置占边长的比例范围
    pub split_ratio: (f64, f64),
    pub min_room_size: i32,
    /// 房间与叶子边界之间的留白
    pub room_padding: i32,
    /// 走廊先横后竖的概率
    pub horizontal_first_chance: f64,
    /// 走廊进入房间处放置门的概率
    pub door_chance: f64,
    /// 特殊房间占候选房间的比例范围
    pub special_room_fraction: (f64, f64),
    pub archetype_weights: Vec<(RoomArchetype, f64)>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_leaf_size: 8,
            max_aspect_ratio: 1.25,
            split_ratio: (0.35, 0.65),
            min_room_size: 4,
            room_padding: 1,
            horizontal_first_chance: 0.5,
            door_chance: 0.4,
            special_room_fraction: (0.2, 0.4),
            archetype_weights: vec![
                (RoomArchetype::Treasure, 3.0),
                (RoomArchetype::MonsterDen, 3.0),
                (RoomArchetype::OreChamber, 4.0),
                (RoomArchetype::Shrine, 1.0),
                (RoomArchetype::Trap, 2.0),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

/// BSP 节点，仅在生成期间存在
#[derive(Debug)]
struct BspNode {
    rect: Rect,
    children: Option<Box<(BspNode, BspNode)>>,
    room: Option<usize>,
}

impl BspNode {
    fn leaf(rect: Rect) -> Self {
        Self {
            rect,
            children: None,
            room: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DungeonGenerator {
    pub config: GeneratorConfig,
}

impl DungeonGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// 生成一层地牢。所有随机性都来自传入的 `rng`
    pub fn generate(&self, width: i32, height: i32, floor: u32, rng: &mut SeededRng) -> Level {
        let mut level = Level::filled(width, height, floor);

        // 保留一圈外墙
        let interior = Rect {
            x: 1,
            y: 1,
            w: (level.width - 2).max(1),
            h: (level.height - 2).max(1),
        };
        let mut root = self.split(interior, rng);

        let mut rooms = Vec::new();
        self.carve_rooms(&mut root, &mut rooms, rng);

        let mut corridors = Vec::new();
        self.connect(&root, &rooms, &mut corridors, rng);

        level.rooms = rooms;
        level.corridors = corridors;
        self.apply_layout_to_tiles(&mut level, rng);
        self.assign_archetypes(&mut level, rng);
        Self::place_stairs(&mut level);

        tracing::debug!(
            floor,
            rooms = level.rooms.len(),
            corridors = level.corridors.len(),
            "generated dungeon level"
        );
        level
    }

    fn split(&self, rect: Rect, rng: &mut SeededRng) -> BspNode {
        let min = self.config.min_leaf_size.max(1);
        if rect.w < min || rect.h < min {
            return BspNode::leaf(rect);
        }

        let can_split_width = rect.w >= min * 2;
        let can_split_height = rect.h >= min * 2;
        if !can_split_width && !can_split_height {
            return BspNode::leaf(rect);
        }

        let aspect = rect.w as f64 / rect.h as f64;
        let mut split_width = if aspect > self.config.max_aspect_ratio {
            true
        } else if 1.0 / aspect > self.config.max_aspect_ratio {
            false
        } else {
            rng.random_bool(0.5)
        };
        if split_width && !can_split_width {
            split_width = false;
        } else if !split_width && !can_split_height {
            split_width = true;
        }

        let (lo, hi) = self.config.split_ratio;
        let fraction = rng.uniform(lo, hi);
        let length = if split_width { rect.w } else { rect.h };
        let offset = ((length as f64 * fraction).round() as i32).clamp(min, length - min);

        let (first, second) = if split_width {
            (
                Rect { w: offset, ..rect },
                Rect {
                    x: rect.x + offset,
                    w: rect.w - offset,
                    ..rect
                },
            )
        } else {
            (
                Rect { h: offset, ..rect },
                Rect {
                    y: rect.y + offset,
                    h: rect.h - offset,
                    ..rect
                },
            )
        };

        let left = self.split(first, rng);
        let right = self.split(second, rng);
        BspNode {
            rect,
            children: Some(Box::new((left, right))),
            room: None,
        }
    }

    fn carve_rooms(&self, node: &mut BspNode, rooms: &mut Vec<Room>, rng: &mut SeededRng) {
        match node.children.as_mut() {
            Some(children) => {
                self.carve_rooms(&mut children.0, rooms, rng);
                self.carve_rooms(&mut children.1, rooms, rng);
            }
            None => {
                node.room = Some(rooms.len());
                rooms.push(self.room_in(node.rect, rng));
            }
        }
    }

    /// 在叶子内挖一个房间；放不下时退化为贴边的最小房间
    fn room_in(&self, rect: Rect, rng: &mut SeededRng) -> Room {
        let pad = self.config.room_padding.max(0);
        let min = self.config.min_room_size.max(1);
        let avail_w = rect.w - pad * 2;
        let avail_h = rect.h - pad * 2;

        if avail_w < min || avail_h < min {
            tracing::debug!(?rect, "leaf too small for padded room, using minimum room");
            return Room::new(rect.x, rect.y, min.min(rect.w), min.min(rect.h));
        }

        let w = rng.range_i(min as i64, avail_w as i64) as i32;
        let h = rng.range_i(min as i64, avail_h as i64) as i32;
        let x = rect.x + pad + rng.range_i(0, (avail_w - w) as i64) as i32;
        let y = rect.y + pad + rng.range_i(0, (avail_h - h) as i64) as i32;
        Room::new(x, y, w, h)
    }

    /// 连接左右子树的代表房间，返回本子树的代表房间
    fn connect(
        &self,
        node: &BspNode,
        rooms: &[Room],
        corridors: &mut Vec<Corridor>,
        rng: &mut SeededRng,
    ) -> Option<usize> {
        let Some(children) = node.children.as_ref() else {
            return node.room;
        };
        let left = self.connect(&children.0, rooms, corridors, rng);
        let right = self.connect(&children.1, rooms, corridors, rng);

        if let (Some(a), Some(b)) = (left, right) {
            let horizontal_first = rng.random_bool(self.config.horizontal_first_chance);
            corridors.push(Corridor::new(rooms[a].center(), rooms[b].center(), horizontal_first));
        }

        if rng.random_bool(0.5) {
            left.or(right)
        } else {
            right.or(left)
        }
    }

    /// 将生成的布局应用到瓦片
    fn apply_layout_to_tiles(&self, level: &mut Level, rng: &mut SeededRng) {
        let mut floor_tiles = Vec::new();
        for room in &level.rooms {
            for y in room.y..room.y + room.height {
                for x in room.x..room.x + room.width {
                    floor_tiles.push((x, y));
                }
            }
        }
        for corridor in &level.corridors {
            floor_tiles.extend(corridor.tiles.iter().copied());
        }
        for (x, y) in floor_tiles {
            level.set_kind(x, y, TileKind::Floor);
        }

        // 走廊穿过墙缝进入房间的位置
        let mut seen = HashSet::new();
        let mut doors = Vec::new();
        for corridor in &level.corridors {
            for &(x, y) in &corridor.tiles {
                if !seen.insert((x, y)) || level.room_at(x, y).is_some() {
                    continue;
                }
                if Self::is_doorway(level, (x, y)) {
                    doors.push((x, y));
                }
            }
        }
        for (x, y) in doors {
            if rng.random_bool(self.config.door_chance) {
                level.set_kind(x, y, TileKind::Door);
            }
        }
    }

    fn is_doorway(level: &Level, (x, y): Pos) -> bool {
        let wall = |x: i32, y: i32| level.kind_at(x, y).is_none_or(|k| k == TileKind::Wall);
        let touches_room = [(0, -1), (1, 0), (0, 1), (-1, 0)]
            .iter()
            .any(|(dx, dy)| level.room_at(x + dx, y + dy).is_some());
        let gap = (wall(x - 1, y) && wall(x + 1, y)) || (wall(x, y - 1) && wall(x, y + 1));
        touches_room && gap
    }

    /// 首尾房间之外随机挑选一部分房间赋予特殊类型
    fn assign_archetypes(&self, level: &mut Level, rng: &mut SeededRng) {
        let count = level.rooms.len();
        if count < 3 {
            return;
        }
        let candidates: Vec<usize> = (1..count - 1).collect();
        let (lo, hi) = self.config.special_room_fraction;
        let fraction = rng.uniform(lo.max(0.0), hi.min(1.0));
        let special = (candidates.len() as f64 * fraction).round() as usize;

        for index in rng.sample(&candidates, special) {
            if let Some(&(archetype, _)) = rng.choose_weighted(&self.config.archetype_weights, |w| w.1) {
                level.rooms[index].archetype = archetype;
            }
        }
    }

    fn place_stairs(level: &mut Level) {
        let Some(last) = level.rooms.last().map(Room::center) else {
            return;
        };
        level.set_kind(last.0, last.1, TileKind::StairsDown);

        if level.floor > 1 {
            if let Some(first) = level.rooms.first().map(Room::center) {
                if first != last {
                    level.set_kind(first.0, first.1, TileKind::StairsUp);
                }
            }
        }
    }
}

/// 便捷函数：使用给定参数生成一层
pub fn generate_level(
    width: i32,
    height: i32,
    floor: u32,
    config: &GeneratorConfig,
    rng: &mut SeededRng,
) -> Level {
    DungeonGenerator::new(config.clone()).generate(width, height, floor, rng)
}
