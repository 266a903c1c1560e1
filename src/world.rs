//! 世界状态：玩家、其他实体、当前层地图、回合计数与消息日志。
//!
//! 非玩家实体保存在以 `EntityId` 为键的 `BTreeMap` 中，
//! 迭代顺序即创建顺序，AI 与生成逻辑依赖这一点保证确定性。

use std::collections::{BTreeMap, VecDeque};

use dungeon::{Level, Pos, SeededRng};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind};

/// 有界消息日志，超出容量时丢弃最旧的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLog {
    capacity: usize,
    messages: VecDeque<String>,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: VecDeque::new(),
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        if self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message.into());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    /// 最近的 n 条消息(从旧到新)
    pub fn recent(&self, n: usize) -> Vec<&str> {
        let skip = self.messages.len().saturating_sub(n);
        self.iter().skip(skip).collect()
    }

    pub fn last(&self) -> Option<&str> {
        self.messages.back().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldState {
    pub player: Entity,
    entities: BTreeMap<EntityId, Entity>,
    pub level: Level,
    pub turn: u64,
    pub floor: u32,
    pub seed: u64,
    pub rng: SeededRng,
    pub messages: MessageLog,
    pub game_over: bool,
    pub victory: bool,
    next_id: u64,
}

impl WorldState {
    /// 玩家总是获得第一个句柄
    pub fn new(rng: SeededRng, level: Level, mut player: Entity, log_capacity: usize) -> Self {
        player.id = EntityId(1);
        Self {
            player,
            entities: BTreeMap::new(),
            floor: level.floor,
            level,
            turn: 0,
            seed: rng.seed(),
            rng,
            messages: MessageLog::new(log_capacity),
            game_over: false,
            victory: false,
            next_id: 2,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        player: Entity,
        entities: BTreeMap<EntityId, Entity>,
        level: Level,
        turn: u64,
        seed: u64,
        rng: SeededRng,
        messages: MessageLog,
        game_over: bool,
        victory: bool,
        next_id: u64,
    ) -> Self {
        Self {
            player,
            entities,
            floor: level.floor,
            level,
            turn,
            seed,
            rng,
            messages,
            game_over,
            victory,
            next_id,
        }
    }

    pub fn player_id(&self) -> EntityId {
        self.player.id
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn entity_map(&self) -> &BTreeMap<EntityId, Entity> {
        &self.entities
    }

    /// 加入实体并分配新句柄
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        entity.id = id;
        debug_assert!(
            entity.position.is_none_or(|(x, y)| self.level.in_bounds(x, y)),
            "spawned {} outside the level",
            entity.name
        );
        self.entities.insert(id, entity);
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        if id == self.player.id {
            Some(&self.player)
        } else {
            self.entities.get(&id)
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if id == self.player.id {
            Some(&mut self.player)
        } else {
            self.entities.get_mut(&id)
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// 移除非玩家实体
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// 非玩家实体，按句柄升序
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// 包括玩家在内的全部实体
    pub fn all_entities(&self) -> impl Iterator<Item = &Entity> {
        std::iter::once(&self.player).chain(self.entities.values())
    }

    pub fn entities_at(&self, pos: Pos) -> impl Iterator<Item = &Entity> {
        self.all_entities().filter(move |e| e.position == Some(pos))
    }

    /// 占据该格、阻挡移动的存活实体
    pub fn blocker_at(&self, pos: Pos) -> Option<EntityId> {
        self.entities_at(pos)
            .find(|e| e.blocks_movement && e.is_alive())
            .map(|e| e.id)
    }

    /// 地形可通行且无阻挡实体
    pub fn is_free(&self, pos: Pos) -> bool {
        self.level.is_walkable(pos.0, pos.1) && self.blocker_at(pos).is_none()
    }

    /// 格子上没有任何实体(用于生成时避免堆叠)
    pub fn is_empty_cell(&self, pos: Pos) -> bool {
        self.level.is_walkable(pos.0, pos.1) && self.entities_at(pos).next().is_none()
    }

    /// 由 AI 控制的实体，按句柄升序
    pub fn actor_ids(&self) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.ai.is_some())
            .map(|e| e.id)
            .collect()
    }

    pub fn count_kind(&self, kind: EntityKind) -> usize {
        self.entities.values().filter(|e| e.kind == kind).count()
    }

    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(turn = self.turn, "{message}");
        self.messages.push(message);
    }

    /// 清除死亡的非玩家实体
    pub fn purge_dead(&mut self) -> Vec<EntityId> {
        let dead: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| !e.is_alive())
            .map(|e| e.id)
            .collect();
        for id in &dead {
            self.entities.remove(id);
        }
        dead
    }

    /// 切换到新的一层：只保留玩家及其携带、装备的物品
    pub fn enter_level(&mut self, level: Level) {
        let carried: Vec<EntityId> = self
            .player
            .inventory
            .iter()
            .copied()
            .chain(self.player.equipment.items())
            .collect();
        self.entities.retain(|id, _| carried.contains(id));
        self.player.mining = None;
        self.player.position = None;
        self.floor = level.floor;
        self.level = level;
    }

    pub fn reveal_from_player(&mut self, radius: i32) -> usize {
        match self.player.position {
            Some((x, y)) => self.level.reveal_around(x, y, radius),
            None => 0,
        }
    }

    /// 检查所有实体与引用关系的不变量
    pub fn check_invariants(&self) -> Result<(), String> {
        for entity in self.all_entities() {
            entity.check_invariants(&self.level)?;
            for item in entity.inventory.iter().copied().chain(entity.equipment.items()) {
                let Some(held) = self.get(item) else {
                    return Err(format!("{} holds missing entity {item}", entity.id));
                };
                if held.position.is_some() {
                    return Err(format!("held item {item} still has a map position"));
                }
            }
            if let Some(progress) = entity.mining {
                if !self.contains(progress.vein) {
                    return Err(format!("{} is mining missing vein {}", entity.id, progress.vein));
                }
            }
        }
        if self.entities.keys().any(|id| id.0 >= self.next_id || *id == self.player.id) {
            return Err("entity id allocation is inconsistent".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dungeon::TileKind;

    fn open_world() -> WorldState {
        let mut level = Level::filled(6, 6, 1);
        for y in 1..5 {
            for x in 1..5 {
                level.set_kind(x, y, TileKind::Floor);
            }
        }
        let player = Entity::player("p", 10, 3, 1).at((1, 1));
        WorldState::new(SeededRng::new(1), level, player, 3)
    }

    #[test]
    fn ids_increase_monotonically() {
        let mut world = open_world();
        let a = world.spawn(Entity::monster("a", 3, 1, 0).at((2, 2)));
        let b = world.spawn(Entity::monster("b", 3, 1, 0).at((3, 3)));
        assert_eq!(world.player_id(), EntityId(1));
        assert!(a < b);
        world.remove(a);
        let c = world.spawn(Entity::monster("c", 3, 1, 0).at((2, 2)));
        assert!(c > b);
    }

    #[test]
    fn blocker_lookup_ignores_items_and_corpses() {
        let mut world = open_world();
        world.spawn(Entity::item("coin", "gold").at((2, 2)));
        assert_eq!(world.blocker_at((2, 2)), None);
        let rat = world.spawn(Entity::monster("rat", 3, 1, 0).at((3, 3)));
        assert_eq!(world.blocker_at((3, 3)), Some(rat));
        world.get_mut(rat).unwrap().take_damage(10);
        assert_eq!(world.blocker_at((3, 3)), None);
        assert_eq!(world.purge_dead(), vec![rat]);
        assert!(!world.contains(rat));
    }

    #[test]
    fn message_log_is_bounded() {
        let mut world = open_world();
        for i in 0..5 {
            world.log(format!("m{i}"));
        }
        assert_eq!(world.messages.recent(10), vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn entering_a_level_keeps_carried_items() {
        let mut world = open_world();
        let sword = world.spawn(Entity::item("sword", "weapon"));
        let ore = world.spawn(Entity::item("ore", "ore"));
        world.spawn(Entity::monster("rat", 3, 1, 0).at((2, 2)));
        world.player.inventory.push(ore);
        world.player.equipment.weapon = Some(sword);
        world.enter_level(Level::filled(8, 8, 2));
        assert_eq!(world.floor, 2);
        assert_eq!(world.entities().count(), 2);
        assert!(world.check_invariants().is_ok());
    }
}
