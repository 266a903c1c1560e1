// src/dungeon/src/level/tiles.rs
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// 地形类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TileKind {
    #[default]
    Wall,
    Floor,
    Door,
    StairsUp,
    StairsDown,
}

impl TileKind {
    /// 是否可通行
    pub fn is_walkable(self) -> bool {
        !matches!(self, TileKind::Wall)
    }

    /// 是否阻挡视线(影响FOV计算)
    pub fn blocks_sight(self) -> bool {
        matches!(self, TileKind::Wall)
    }

    pub fn is_stair(self) -> bool {
        matches!(self, TileKind::StairsUp | TileKind::StairsDown)
    }
}

/// 表示地图中的一个格子
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    /// 是否已被探索过(用于记忆系统)
    pub explored: bool,
}

impl Tile {
    pub fn new(kind: TileKind) -> Self {
        Self {
            kind,
            explored: false,
        }
    }

    pub fn is_walkable(&self) -> bool {
        self.kind.is_walkable()
    }

    pub fn blocks_sight(&self) -> bool {
        self.kind.blocks_sight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn walls_block_everything_else_walkable() {
        assert!(!TileKind::Wall.is_walkable());
        assert!(TileKind::Wall.blocks_sight());
        for kind in [TileKind::Floor, TileKind::Door, TileKind::StairsUp, TileKind::StairsDown] {
            assert!(kind.is_walkable());
            assert!(!kind.blocks_sight());
        }
    }

    #[test]
    fn tile_kind_tags_are_snake_case() {
        assert_eq!(TileKind::StairsDown.to_string(), "stairs_down");
        assert_eq!(TileKind::from_str("door").unwrap(), TileKind::Door);
    }
}
