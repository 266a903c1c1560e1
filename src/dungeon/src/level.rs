// src/dungeon/src/level.rs

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub mod tiles;

use crate::pathfinding::bresenham_line;
use crate::rng::SeededRng;
pub use tiles::{Tile, TileKind};

/// 网格坐标
pub type Pos = (i32, i32);

/// 单层地牢：瓦片网格、房间列表、走廊记录与缓存的楼梯坐标
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub width: i32,
    pub height: i32,
    /// 层数(从1开始)
    pub floor: u32,
    tiles: Vec<Tile>,
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    stair_down: Option<Pos>,
    stair_up: Option<Pos>,
}

impl Level {
    /// 创建一个全部为墙壁的网格
    pub fn filled(width: i32, height: i32, floor: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            floor,
            tiles: vec![Tile::new(TileKind::Wall); width as usize * height as usize],
            rooms: Vec::new(),
            corridors: Vec::new(),
            stair_down: None,
            stair_up: None,
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// 获取指定位置的瓦片
    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index(x, y).map(|i| &self.tiles[i])
    }

    /// 获取指定位置的瓦片(可变引用)
    pub fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.index(x, y).map(move |i| &mut self.tiles[i])
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn kind_at(&self, x: i32, y: i32) -> Option<TileKind> {
        self.tile(x, y).map(|t| t.kind)
    }

    /// 修改地形。楼梯坐标在此处缓存，避免之后全图扫描
    pub fn set_kind(&mut self, x: i32, y: i32, kind: TileKind) -> bool {
        let Some(tile) = self.tile_mut(x, y) else {
            return false;
        };
        let previous = tile.kind;
        tile.kind = kind;

        if previous == TileKind::StairsDown && self.stair_down == Some((x, y)) {
            self.stair_down = None;
        }
        if previous == TileKind::StairsUp && self.stair_up == Some((x, y)) {
            self.stair_up = None;
        }
        match kind {
            TileKind::StairsDown => self.stair_down = Some((x, y)),
            TileKind::StairsUp => self.stair_up = Some((x, y)),
            _ => {}
        }
        true
    }

    /// 检查位置是否可通行(只考虑地形)
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).is_some_and(Tile::is_walkable)
    }

    pub fn stair_down(&self) -> Option<Pos> {
        self.stair_down
    }

    pub fn stair_up(&self) -> Option<Pos> {
        self.stair_up
    }

    /// 检查位置是否已被探索
    pub fn is_explored(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).is_some_and(|t| t.explored)
    }

    pub fn explored_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.explored).count()
    }

    /// 标记视野半径内、视线未被阻挡的格子为已探索
    pub fn reveal_around(&mut self, x: i32, y: i32, radius: i32) -> usize {
        let radius = radius.max(0);
        let mut newly = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let (nx, ny) = (x + dx, y + dy);
                if dx * dx + dy * dy > radius * radius || !self.in_bounds(nx, ny) {
                    continue;
                }
                if !self.is_explored(nx, ny) && self.has_line_of_sight((x, y), (nx, ny)) {
                    newly.push((nx, ny));
                }
            }
        }
        for (nx, ny) in &newly {
            if let Some(tile) = self.tile_mut(*nx, *ny) {
                tile.explored = true;
            }
        }
        newly.len()
    }

    /// 检查两点之间是否有视线(端点不计入阻挡)
    pub fn has_line_of_sight(&self, from: Pos, to: Pos) -> bool {
        bresenham_line(from, to)
            .into_iter()
            .filter(|&p| p != from && p != to)
            .all(|(x, y)| self.tile(x, y).is_some_and(|t| !t.blocks_sight()))
    }

    /// 包含指定坐标的房间索引
    pub fn room_at(&self, x: i32, y: i32) -> Option<usize> {
        self.rooms.iter().position(|r| r.contains(x, y))
    }

    pub fn walkable_cells(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_walkable(x, y))
    }
}

/// 房间类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RoomArchetype {
    #[default]
    Normal,
    Treasure,
    MonsterDen,
    OreChamber,
    Shrine,
    Trap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub archetype: RoomArchetype,
}

impl Room {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            archetype: RoomArchetype::Normal,
        }
    }

    /// 获取房间中心点
    pub fn center(&self) -> Pos {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// 获取房间内的随机点
    pub fn random_point(&self, rng: &mut SeededRng) -> Pos {
        let x = rng.range_i(self.x as i64, (self.x + self.width - 1) as i64) as i32;
        let y = rng.range_i(self.y as i64, (self.y + self.height - 1) as i64) as i32;
        (x, y)
    }

    /// 检查房间是否与另一个房间相交
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    pub fn area(&self) -> i32 {
        self.width * self.height
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    pub start: Pos,
    pub end: Pos,
    pub horizontal_first: bool,
    pub tiles: Vec<Pos>,
}

impl Corridor {
    pub fn new(start: Pos, end: Pos, horizontal_first: bool) -> Self {
        let tiles = Self::create_corridor_tiles(start, end, horizontal_first);
        Self {
            start,
            end,
            horizontal_first,
            tiles,
        }
    }

    /// 创建连接两个点的L形走廊瓦片(包含两端)
    fn create_corridor_tiles(start: Pos, end: Pos, horizontal_first: bool) -> Vec<Pos> {
        let mut tiles = vec![start];
        let (mut x, mut y) = start;
        let (end_x, end_y) = end;

        if horizontal_first {
            while x != end_x {
                x += (end_x - x).signum();
                tiles.push((x, y));
            }
            while y != end_y {
                y += (end_y - y).signum();
                tiles.push((x, y));
            }
        } else {
            while y != end_y {
                y += (end_y - y).signum();
                tiles.push((x, y));
            }
            while x != end_x {
                x += (end_x - x).signum();
                tiles.push((x, y));
            }
        }

        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stair_positions_are_cached_on_placement() {
        let mut level = Level::filled(10, 10, 1);
        assert!(level.stair_down().is_none());
        level.set_kind(3, 4, TileKind::StairsDown);
        assert_eq!(level.stair_down(), Some((3, 4)));
        level.set_kind(3, 4, TileKind::Floor);
        assert_eq!(level.stair_down(), None);
    }

    #[test]
    fn wide_levels_index_every_column() {
        let level = Level::filled(70_000, 1, 1);
        assert_eq!(level.tiles.len(), 70_000);
        assert!(level.tile(69_999, 0).is_some());
        assert!(level.tile(70_000, 0).is_none());
    }

    #[test]
    fn out_of_bounds_is_not_walkable() {
        let mut level = Level::filled(5, 5, 1);
        level.set_kind(0, 0, TileKind::Floor);
        assert!(level.is_walkable(0, 0));
        assert!(!level.is_walkable(-1, 0));
        assert!(!level.is_walkable(5, 0));
        assert!(!level.set_kind(9, 9, TileKind::Floor));
    }

    #[test]
    fn corridor_bend_order() {
        let h = Corridor::new((0, 0), (3, 2), true);
        assert_eq!(h.tiles[1], (1, 0));
        assert_eq!(*h.tiles.last().unwrap(), (3, 2));
        let v = Corridor::new((0, 0), (3, 2), false);
        assert_eq!(v.tiles[1], (0, 1));
        assert_eq!(v.tiles.len(), 6);
    }

    #[test]
    fn walls_block_revealing() {
        let mut level = Level::filled(9, 3, 1);
        for x in 0..9 {
            level.set_kind(x, 1, TileKind::Floor);
        }
        level.set_kind(4, 1, TileKind::Wall);
        level.reveal_around(1, 1, 8);
        assert!(level.is_explored(3, 1));
        assert!(level.is_explored(4, 1));
        assert!(!level.is_explored(6, 1));
    }
}
