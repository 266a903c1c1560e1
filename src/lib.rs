//! Deepforge：回合制地牢采矿模拟核心。
//!
//! 无界面、确定性：给定种子与动作序列，结果完全可复现。
//! 地图生成与寻路在 `dungeon` 子 crate 中，错误类型在 `error` 子 crate 中。

pub mod actions;
pub mod ai;
pub mod config;
pub mod content;
pub mod entity;
pub mod event_bus;
pub mod formula;
pub mod save;
pub mod session;
pub mod spawner;
pub mod turn_system;
pub mod world;

pub use actions::{Action, ActionContext, ActionRequest, Outcome, OutcomeStatus};
pub use config::SimConfig;
pub use content::ContentRegistry;
pub use entity::{AttrValue, Entity, EntityId, EntityKind, EquipSlot};
pub use event_bus::{Event, EventBus, EventKind};
pub use save::SaveData;
pub use session::{Session, StepResult};
pub use turn_system::{TurnProcessor, TurnReport, TurnState};
pub use world::WorldState;
