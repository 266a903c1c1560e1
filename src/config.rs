//! 模拟参数。所有可调常量集中在这里，按子系统分组，
//! 每组都实现 `Default`，并允许通过 serde 从部分 JSON 覆盖。

use dungeon::{GeneratorConfig, PathfindingConfig};
use serde::{Deserialize, Serialize};

use crate::formula::Formula;

/// 掉落分配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LootMode {
    /// 掉落在死亡位置，谁先捡到归谁
    #[default]
    Shared,
    /// 每个玩家独立掷骰，直接放入背包
    PerPlayer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// 输入：`attack`、`defense`
    pub damage_formula: Formula,
    pub min_damage: i32,
    pub loot_mode: LootMode,
    /// 升到下一级所需经验 = base × 当前等级
    pub level_xp_base: i64,
    pub level_hp_gain: i32,
    pub level_attack_gain: i32,
    pub level_defense_gain: i32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            damage_formula: Formula::linear(0.0, &[("attack", 1.0), ("defense", -1.0)]),
            min_damage: 1,
            loot_mode: LootMode::Shared,
            level_xp_base: 20,
            level_hp_gain: 5,
            level_attack_gain: 1,
            level_defense_gain: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// 输入：`hardness`、`attack`
    pub turns_formula: Formula,
    pub min_turns: u32,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            turns_formula: Formula::linear(0.0, &[("hardness", 1.0)]),
            min_turns: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenConfig {
    /// 每隔多少回合恢复一次，0 表示关闭
    pub interval: u64,
    pub amount: i32,
}

impl Default for RegenConfig {
    fn default() -> Self {
        Self { interval: 10, amount: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub sight_range: i32,
    /// 防御型怪物生命比例低于该值时逃跑
    pub flee_hp_fraction: f64,
    pub coward_range: i32,
    pub guard_leash_radius: i32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            sight_range: 8,
            flee_hp_fraction: 0.3,
            coward_range: 5,
            guard_leash_radius: 6,
        }
    }
}

/// 按层数区间生效的权重表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnTable {
    pub min_floor: u32,
    pub max_floor: u32,
    pub weights: Vec<(String, f64)>,
}

impl SpawnTable {
    pub fn new(min_floor: u32, max_floor: u32, weights: &[(&str, f64)]) -> Self {
        Self {
            min_floor,
            max_floor,
            weights: weights.iter().map(|(id, w)| (id.to_string(), *w)).collect(),
        }
    }

    pub fn covers(&self, floor: u32) -> bool {
        (self.min_floor..=self.max_floor).contains(&floor)
    }
}

/// 在分层表中查找对应层数的权重，超出所有区间时使用最后一张表
pub fn weights_for_floor(tables: &[SpawnTable], floor: u32) -> &[(String, f64)] {
    tables
        .iter()
        .find(|t| t.covers(floor))
        .or(tables.last())
        .map(|t| t.weights.as_slice())
        .unwrap_or(&[])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub monsters_per_room: (u32, u32),
    pub den_extra_monsters: (u32, u32),
    pub veins_per_floor: (u32, u32),
    pub chamber_extra_veins: (u32, u32),
    pub treasure_items: (u32, u32),
    pub treasure_loot_table: String,
    pub monster_tables: Vec<SpawnTable>,
    pub ore_tables: Vec<SpawnTable>,
    /// 第一层起始房间放一座熔炉
    pub forge_in_start_room: bool,
    /// 放置实体时在房间内随机取点的尝试次数
    pub placement_attempts: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            monsters_per_room: (0, 2),
            den_extra_monsters: (2, 3),
            veins_per_floor: (3, 6),
            chamber_extra_veins: (2, 3),
            treasure_items: (1, 3),
            treasure_loot_table: "treasure".to_string(),
            monster_tables: vec![
                SpawnTable::new(1, 2, &[("rat", 5.0), ("bat", 3.0), ("kobold", 2.0), ("cave_crab", 1.0)]),
                SpawnTable::new(3, 4, &[("kobold", 4.0), ("goblin", 4.0), ("cave_crab", 2.0), ("golem", 1.0)]),
                SpawnTable::new(5, u32::MAX, &[("goblin", 3.0), ("golem", 3.0), ("wraith", 2.0)]),
            ],
            ore_tables: vec![
                SpawnTable::new(1, 2, &[("copper", 6.0), ("iron", 3.0)]),
                SpawnTable::new(3, u32::MAX, &[("copper", 2.0), ("iron", 5.0), ("mithril", 2.0)]),
            ],
            forge_in_start_room: true,
            placement_attempts: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopickupConfig {
    pub enabled: bool,
    pub item_types: Vec<String>,
}

impl Default for AutopickupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            item_types: vec!["ore".to_string(), "gold".to_string()],
        }
    }
}

impl AutopickupConfig {
    pub fn picks_up(&self, item_type: Option<&str>) -> bool {
        self.enabled && item_type.is_some_and(|t| self.item_types.iter().any(|a| a == t))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub name: String,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            name: "Delver".to_string(),
            max_hp: 30,
            attack: 5,
            defense: 2,
        }
    }
}

/// 整个会话的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub map_width: i32,
    pub map_height: i32,
    pub generator: GeneratorConfig,
    pub pathfinding: PathfindingConfig,
    pub combat: CombatConfig,
    pub mining: MiningConfig,
    pub regen: RegenConfig,
    pub ai: AiConfig,
    pub spawn: SpawnConfig,
    pub autopickup: AutopickupConfig,
    pub player: PlayerConfig,
    /// 到达该层即胜利
    pub victory_floor: u32,
    pub message_log_capacity: usize,
    pub inventory_capacity: usize,
    pub fov_radius: i32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            map_width: 64,
            map_height: 40,
            generator: GeneratorConfig::default(),
            pathfinding: PathfindingConfig::default(),
            combat: CombatConfig::default(),
            mining: MiningConfig::default(),
            regen: RegenConfig::default(),
            ai: AiConfig::default(),
            spawn: SpawnConfig::default(),
            autopickup: AutopickupConfig::default(),
            player: PlayerConfig::default(),
            victory_floor: 5,
            message_log_capacity: 100,
            inventory_capacity: 20,
            fov_radius: 8,
        }
    }
}

impl SimConfig {
    /// 从 JSON 读取配置，缺失字段使用默认值
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
