//src/dungeon/src/lib.rs
//! 地牢子系统：确定性随机源、BSP 关卡生成与网格寻路。
//!
//! 该 crate 不依赖实体或动作层，只提供网格查询，
//! 上层模拟通过 `Walkable` 与 `Level` 访问地形。

pub mod generator;
pub mod level;
pub mod pathfinding;
pub mod rng;

pub use generator::{DungeonGenerator, GeneratorConfig, generate_level};
pub use level::{Corridor, Level, Pos, Room, RoomArchetype, Tile, TileKind};
pub use pathfinding::{Connectivity, Heuristic, Pathfinder, PathfindingConfig, Walkable};
pub use rng::{RngState, SeedInput, SeededRng};
