//! 实体模型：玩家、怪物、物品、矿脉、熔炉与 NPC 共用同一个结构。
//!
//! 实体之间的关系(背包、装备、挖矿目标)一律以 `EntityId` 句柄保存，
//! 由 `WorldState` 负责按句柄查找，不存在拥有型指针。

use std::collections::BTreeMap;
use std::fmt;

use dungeon::{Level, Pos};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ai::AiState;

/// 稳定的实体句柄，会话内单调分配、不复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Player,
    Monster,
    Item,
    OreVein,
    Forge,
    Npc,
}

/// 属性表中的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl AttrValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Float(v) => Some(v.round() as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v:.2}"),
            AttrValue::Text(v) => write!(f, "{v}"),
            AttrValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl From<EntityId> for AttrValue {
    fn from(v: EntityId) -> Self {
        AttrValue::Int(v.0 as i64)
    }
}

pub type AttrMap = BTreeMap<String, AttrValue>;

/// 由键值对构建属性表
pub fn attr_map<const N: usize>(pairs: [(&str, AttrValue); N]) -> AttrMap {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// 约定的属性键
pub mod keys {
    pub const ITEM_TYPE: &str = "item_type";
    pub const RESOURCE_TYPE: &str = "resource_type";
    pub const SLOT: &str = "slot";
    pub const ATTACK_BONUS: &str = "attack_bonus";
    pub const DEFENSE_BONUS: &str = "defense_bonus";
    pub const HARDNESS: &str = "hardness";
    pub const XP_VALUE: &str = "xp_value";
    pub const LOOT_TABLE: &str = "loot_table";
    pub const SURVEYED: &str = "surveyed";
    pub const LEVEL: &str = "level";
    pub const EXPERIENCE: &str = "experience";
    /// 矿石品质属性的前缀，例如 `quality:purity`
    pub const QUALITY_PREFIX: &str = "quality:";
}

/// 装备槽
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EquipSlot {
    Weapon,
    Armor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub weapon: Option<EntityId>,
    pub armor: Option<EntityId>,
}

impl Equipment {
    pub fn get(&self, slot: EquipSlot) -> Option<EntityId> {
        match slot {
            EquipSlot::Weapon => self.weapon,
            EquipSlot::Armor => self.armor,
        }
    }

    /// 设置槽位，返回之前装备的物品
    pub fn set(&mut self, slot: EquipSlot, item: Option<EntityId>) -> Option<EntityId> {
        let target = match slot {
            EquipSlot::Weapon => &mut self.weapon,
            EquipSlot::Armor => &mut self.armor,
        };
        std::mem::replace(target, item)
    }

    pub fn items(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.weapon.into_iter().chain(self.armor)
    }

    pub fn contains(&self, item: EntityId) -> bool {
        self.items().any(|i| i == item)
    }
}

/// 进行中的挖矿状态，保存在挖矿者身上
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningProgress {
    pub vein: EntityId,
    pub turns_remaining: u32,
    pub total_turns: u32,
}

/// 任意可寻址的游戏对象
///
/// 不变量：`0 <= hp <= max_hp`，`is_alive == (hp > 0)`。
/// hp 只能通过下面的方法修改，每个方法都会重新建立这两个不变量。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub position: Option<Pos>,
    hp: i32,
    max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    is_alive: bool,
    pub attackable: bool,
    pub blocks_movement: bool,
    pub content_id: Option<String>,
    pub attributes: AttrMap,
    pub inventory: Vec<EntityId>,
    pub equipment: Equipment,
    pub mining: Option<MiningProgress>,
    pub ai: Option<AiState>,
}

impl Entity {
    /// 创建实体，句柄在加入世界时分配
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: EntityId(0),
            kind,
            name: name.into(),
            position: None,
            hp: 1,
            max_hp: 1,
            attack: 0,
            defense: 0,
            is_alive: true,
            attackable: false,
            blocks_movement: false,
            content_id: None,
            attributes: AttrMap::new(),
            inventory: Vec::new(),
            equipment: Equipment::default(),
            mining: None,
            ai: None,
        }
    }

    pub fn player(name: impl Into<String>, max_hp: i32, attack: i32, defense: i32) -> Self {
        let mut player = Self::new(EntityKind::Player, name).with_stats(max_hp, attack, defense);
        player.attackable = true;
        player.blocks_movement = true;
        player.set_attr(keys::LEVEL, 1);
        player.set_attr(keys::EXPERIENCE, 0);
        player
    }

    pub fn monster(name: impl Into<String>, max_hp: i32, attack: i32, defense: i32) -> Self {
        let mut monster = Self::new(EntityKind::Monster, name).with_stats(max_hp, attack, defense);
        monster.attackable = true;
        monster.blocks_movement = true;
        monster
    }

    pub fn item(name: impl Into<String>, item_type: &str) -> Self {
        Self::new(EntityKind::Item, name).with_attr(keys::ITEM_TYPE, item_type)
    }

    pub fn ore_vein(name: impl Into<String>, hardness: i64) -> Self {
        let mut vein = Self::new(EntityKind::OreVein, name).with_attr(keys::HARDNESS, hardness);
        vein.blocks_movement = true;
        vein
    }

    pub fn forge() -> Self {
        let mut forge = Self::new(EntityKind::Forge, "forge");
        forge.blocks_movement = true;
        forge
    }

    pub fn with_stats(mut self, max_hp: i32, attack: i32, defense: i32) -> Self {
        self.max_hp = max_hp.max(1);
        self.hp = self.max_hp;
        self.is_alive = true;
        self.attack = attack;
        self.defense = defense;
        self
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.position = Some(pos);
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_content(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    pub fn with_ai(mut self, ai: AiState) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn max_hp(&self) -> i32 {
        self.max_hp
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn is_player(&self) -> bool {
        self.kind == EntityKind::Player
    }

    pub fn hp_fraction(&self) -> f64 {
        self.hp as f64 / self.max_hp as f64
    }

    /// 受到伤害，返回实际扣除的生命值
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let dealt = amount.clamp(0, self.hp);
        self.hp -= dealt;
        self.is_alive = self.hp > 0;
        dealt
    }

    /// 治疗(死亡实体不能被治疗)，返回实际恢复量
    pub fn heal(&mut self, amount: i32) -> i32 {
        if !self.is_alive {
            return 0;
        }
        let healed = amount.clamp(0, self.max_hp - self.hp);
        self.hp += healed;
        healed
    }

    pub fn set_max_hp(&mut self, max_hp: i32) {
        self.max_hp = max_hp.max(1);
        self.hp = self.hp.min(self.max_hp);
        self.is_alive = self.hp > 0;
    }

    pub fn restore_full(&mut self) {
        if self.is_alive {
            self.hp = self.max_hp;
        }
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn attr_i64(&self, key: &str) -> Option<i64> {
        self.attr(key).and_then(AttrValue::as_i64)
    }

    pub fn attr_f64(&self, key: &str) -> Option<f64> {
        self.attr(key).and_then(AttrValue::as_f64)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(AttrValue::as_str)
    }

    pub fn attr_bool(&self, key: &str) -> bool {
        self.attr(key).and_then(AttrValue::as_bool).unwrap_or(false)
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn item_type(&self) -> Option<&str> {
        self.attr_str(keys::ITEM_TYPE)
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.attr_str(keys::RESOURCE_TYPE)
    }

    pub fn slot(&self) -> Option<EquipSlot> {
        self.attr_str(keys::SLOT).and_then(|s| s.parse().ok())
    }

    /// 品质属性(去掉前缀)，按名称排序
    pub fn qualities(&self) -> Vec<(String, f64)> {
        self.attributes
            .iter()
            .filter_map(|(k, v)| {
                let name = k.strip_prefix(keys::QUALITY_PREFIX)?;
                Some((name.to_string(), v.as_f64()?))
            })
            .collect()
    }

    pub fn set_quality(&mut self, name: &str, value: f64) {
        self.set_attr(&format!("{}{}", keys::QUALITY_PREFIX, name), value);
    }

    /// 检查实体不变量
    pub fn check_invariants(&self, level: &Level) -> Result<(), String> {
        if self.hp < 0 || self.hp > self.max_hp {
            return Err(format!("{} {}: hp {} outside 0..={}", self.kind, self.id, self.hp, self.max_hp));
        }
        if self.is_alive != (self.hp > 0) {
            return Err(format!("{} {}: is_alive={} but hp={}", self.kind, self.id, self.is_alive, self.hp));
        }
        if let Some((x, y)) = self.position {
            if !level.in_bounds(x, y) {
                return Err(format!("{} {}: position ({x}, {y}) out of bounds", self.kind, self.id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_and_heal_keep_invariants() {
        let mut rat = Entity::monster("rat", 10, 3, 1);
        assert_eq!(rat.take_damage(4), 4);
        assert_eq!(rat.hp(), 6);
        assert_eq!(rat.heal(100), 4);
        assert_eq!(rat.take_damage(50), 10);
        assert_eq!(rat.hp(), 0);
        assert!(!rat.is_alive());
        assert_eq!(rat.heal(5), 0);
        assert_eq!(rat.take_damage(-3), 0);
    }

    #[test]
    fn shrinking_max_hp_clamps_hp() {
        let mut e = Entity::player("p", 20, 1, 1);
        e.set_max_hp(5);
        assert_eq!(e.hp(), 5);
        assert!(e.check_invariants(&Level::filled(3, 3, 1)).is_ok());
    }

    #[test]
    fn equipment_swap_returns_previous() {
        let mut eq = Equipment::default();
        assert_eq!(eq.set(EquipSlot::Weapon, Some(EntityId(4))), None);
        assert_eq!(eq.set(EquipSlot::Weapon, Some(EntityId(9))), Some(EntityId(4)));
        assert!(eq.contains(EntityId(9)));
        assert_eq!(eq.items().count(), 1);
    }

    #[test]
    fn qualities_strip_prefix() {
        let mut ore = Entity::item("iron ore", "ore");
        ore.set_quality("purity", 0.5);
        ore.set_quality("density", 0.25);
        assert_eq!(
            ore.qualities(),
            vec![("density".to_string(), 0.25), ("purity".to_string(), 0.5)]
        );
    }

    #[test]
    fn out_of_bounds_position_fails_invariant_check() {
        let e = Entity::monster("bat", 3, 1, 0).at((10, 10));
        assert!(e.check_invariants(&Level::filled(5, 5, 1)).is_err());
    }
}
