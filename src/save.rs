// src/save.rs
//! 存档：完整的世界快照，包括随机源内部状态，
//! 读档后继续运行与不中断运行的结果逐位一致。

use std::collections::BTreeMap;

use bincode::config;
use dungeon::{Level, RngState, SeededRng};
use error::GameError;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};
use crate::world::{MessageLog, WorldState};

/// 当前存档格式版本
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub seed: u64,
    pub floor: u32,
    pub turn: u64,
    pub game_over: bool,
    pub victory: bool,
    pub next_id: u64,
    pub player: Entity,
    pub entities: BTreeMap<EntityId, Entity>,
    pub level: Level,
    pub rng: RngState,
    pub messages: MessageLog,
}

impl SaveData {
    pub fn capture(world: &WorldState) -> Self {
        Self {
            version: SAVE_VERSION,
            seed: world.seed,
            floor: world.floor,
            turn: world.turn,
            game_over: world.game_over,
            victory: world.victory,
            next_id: world.next_id(),
            player: world.player.clone(),
            entities: world.entity_map().clone(),
            level: world.level.clone(),
            rng: world.rng.state(),
            messages: world.messages.clone(),
        }
    }

    /// 校验存档完整性
    pub fn validate(&self) -> Result<(), GameError> {
        if self.version != SAVE_VERSION {
            return Err(GameError::VersionMismatch(self.version));
        }
        if self.floor == 0 || self.floor != self.level.floor {
            return Err(GameError::InvalidGameState(format!(
                "floor {} does not match level floor {}",
                self.floor, self.level.floor
            )));
        }
        if self.rng.seed() != self.seed {
            return Err(GameError::InvalidGameState("rng seed does not match session seed".into()));
        }
        if let Some((key, entity)) = self.entities.iter().find(|(key, e)| **key != e.id) {
            return Err(GameError::CorruptedSave(format!(
                "entity stored under {key} claims id {}",
                entity.id
            )));
        }
        Ok(())
    }

    /// 还原世界并检查所有不变量
    pub fn into_world(self) -> Result<WorldState, GameError> {
        self.validate()?;
        let mut rng = SeededRng::new(self.seed);
        rng.set_state(self.rng);
        let world = WorldState::from_parts(
            self.player,
            self.entities,
            self.level,
            self.turn,
            self.seed,
            rng,
            self.messages,
            self.game_over,
            self.victory,
            self.next_id,
        );
        world.check_invariants().map_err(GameError::InvalidGameState)?;
        Ok(world)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GameError> {
        Ok(bincode::serde::encode_to_vec(self, config::standard())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GameError> {
        let (data, read): (Self, usize) = bincode::serde::decode_from_slice(bytes, config::standard())?;
        if read != bytes.len() {
            return Err(GameError::CorruptedSave(format!(
                "{} trailing bytes after save data",
                bytes.len() - read
            )));
        }
        Ok(data)
    }

    pub fn to_json(&self) -> Result<String, GameError> {
        serde_json::to_string_pretty(self).map_err(|e| GameError::SerializationError(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, GameError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dungeon::TileKind;

    fn world() -> WorldState {
        let mut level = Level::filled(5, 5, 1);
        level.set_kind(2, 2, TileKind::Floor);
        let mut world = WorldState::new(SeededRng::new(9), level, Entity::player("p", 10, 2, 1).at((2, 2)), 10);
        world.spawn(Entity::item("coin", "gold").at((2, 2)));
        world.log("hello");
        world
    }

    #[test]
    fn bincode_round_trip_restores_world() {
        let mut original = world();
        original.rng.random_f64();
        let bytes = SaveData::capture(&original).to_bytes().unwrap();
        let mut restored = SaveData::from_bytes(&bytes).unwrap().into_world().unwrap();
        assert_eq!(restored, original);
        assert_eq!(restored.rng.random_f64(), original.rng.random_f64());
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut data = SaveData::capture(&world());
        data.version = 99;
        assert!(matches!(data.validate(), Err(GameError::VersionMismatch(99))));
    }

    #[test]
    fn truncated_bytes_are_reported_as_corrupted() {
        let bytes = SaveData::capture(&world()).to_bytes().unwrap();
        let err = SaveData::from_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, GameError::CorruptedSave(_) | GameError::DeserializationError(_)));
    }

    #[test]
    fn json_round_trip() {
        let data = SaveData::capture(&world());
        let json = data.to_json().unwrap();
        assert_eq!(SaveData::from_json(&json).unwrap(), data);
    }
}
