//! 静态内容注册表：怪物、矿石、物品、配方与掉落表。
//!
//! 内容在会话创建时整体校验一次，之后的查找失败都视为内部错误。

use std::collections::{BTreeMap, BTreeSet};

use dungeon::{Pos, SeededRng};
use error::ContentError;
use serde::{Deserialize, Serialize};

use crate::ai::{AiState, Behavior};
use crate::config::SimConfig;
use crate::entity::{EquipSlot, Entity, keys};
use crate::formula::Formula;

/// 伤害公式可用的输入
pub const DAMAGE_INPUTS: [&str; 2] = ["attack", "defense"];
/// 挖矿回合公式可用的输入
pub const MINING_INPUTS: [&str; 2] = ["hardness", "attack"];
/// 配方可产出的属性
pub const RECIPE_STATS: [&str; 2] = [keys::ATTACK_BONUS, keys::DEFENSE_BONUS];
/// 地图的最小边长：一圈外墙加一格内部
pub const MIN_MAP_SIDE: i32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterDef {
    pub id: String,
    pub name: String,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub xp_value: i64,
    /// 行为标签，未知标签回退为 aggressive
    pub behavior: String,
    pub loot_table: Option<String>,
}

impl MonsterDef {
    pub fn instantiate(&self, pos: Pos) -> Entity {
        let mut monster = Entity::monster(&self.name, self.max_hp, self.attack, self.defense)
            .with_content(&self.id)
            .with_attr(keys::XP_VALUE, self.xp_value)
            .with_ai(AiState::new(Behavior::from_tag(&self.behavior), pos))
            .at(pos);
        if let Some(table) = &self.loot_table {
            monster.set_attr(keys::LOOT_TABLE, table.as_str());
        }
        monster
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OreDef {
    pub id: String,
    pub name: String,
    pub hardness: i64,
    /// 品质名 -> 取值区间
    pub qualities: BTreeMap<String, (f64, f64)>,
}

impl OreDef {
    /// 生成矿脉并掷出各项品质
    pub fn instantiate(&self, pos: Pos, rng: &mut SeededRng) -> Entity {
        let mut vein = Entity::ore_vein(format!("{} vein", self.name), self.hardness)
            .with_content(&self.id)
            .with_attr(keys::RESOURCE_TYPE, self.id.as_str())
            .at(pos);
        for (quality, (lo, hi)) in &self.qualities {
            let value = rng.uniform(*lo, *hi);
            vein.set_quality(quality, (value * 100.0).round() / 100.0);
        }
        vein
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    pub item_type: String,
    pub slot: Option<EquipSlot>,
    pub attack_bonus: i32,
    pub defense_bonus: i32,
}

impl ItemDef {
    pub fn instantiate(&self) -> Entity {
        let mut item = Entity::item(&self.name, &self.item_type).with_content(&self.id);
        if let Some(slot) = self.slot {
            item.set_attr(keys::SLOT, slot.to_string());
        }
        if self.attack_bonus != 0 {
            item.set_attr(keys::ATTACK_BONUS, self.attack_bonus);
        }
        if self.defense_bonus != 0 {
            item.set_attr(keys::DEFENSE_BONUS, self.defense_bonus);
        }
        item
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDef {
    pub id: String,
    pub name: String,
    /// 消耗的资源类型(矿石 id)
    pub resource: String,
    pub count: usize,
    pub output_name: String,
    pub item_type: String,
    pub slot: Option<EquipSlot>,
    /// 产出属性 -> 以平均品质为输入的公式
    pub stats: BTreeMap<String, Formula>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootEntry {
    pub item: String,
    pub chance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootTable {
    pub id: String,
    pub entries: Vec<LootEntry>,
}

impl LootTable {
    /// 逐条独立掷骰，返回掉落的物品 id
    pub fn roll<'a>(&'a self, rng: &mut SeededRng) -> Vec<&'a str> {
        self.entries
            .iter()
            .filter(|entry| rng.random_f64() < entry.chance)
            .map(|entry| entry.item.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRegistry {
    pub monsters: BTreeMap<String, MonsterDef>,
    pub ores: BTreeMap<String, OreDef>,
    pub items: BTreeMap<String, ItemDef>,
    pub recipes: BTreeMap<String, RecipeDef>,
    pub loot_tables: BTreeMap<String, LootTable>,
}

impl ContentRegistry {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn add_monster(&mut self, def: MonsterDef) {
        self.monsters.insert(def.id.clone(), def);
    }

    pub fn add_ore(&mut self, def: OreDef) {
        self.ores.insert(def.id.clone(), def);
    }

    pub fn add_item(&mut self, def: ItemDef) {
        self.items.insert(def.id.clone(), def);
    }

    pub fn add_recipe(&mut self, def: RecipeDef) {
        self.recipes.insert(def.id.clone(), def);
    }

    pub fn add_loot_table(&mut self, table: LootTable) {
        self.loot_tables.insert(table.id.clone(), table);
    }

    pub fn monster(&self, id: &str) -> Result<&MonsterDef, ContentError> {
        self.monsters.get(id).ok_or_else(|| ContentError::UnknownMonster(id.to_string()))
    }

    pub fn ore(&self, id: &str) -> Result<&OreDef, ContentError> {
        self.ores.get(id).ok_or_else(|| ContentError::UnknownOre(id.to_string()))
    }

    pub fn item(&self, id: &str) -> Result<&ItemDef, ContentError> {
        self.items.get(id).ok_or_else(|| ContentError::UnknownItem(id.to_string()))
    }

    pub fn recipe(&self, id: &str) -> Result<&RecipeDef, ContentError> {
        self.recipes.get(id).ok_or_else(|| ContentError::UnknownRecipe(id.to_string()))
    }

    pub fn loot_table(&self, id: &str) -> Result<&LootTable, ContentError> {
        self.loot_tables
            .get(id)
            .ok_or_else(|| ContentError::UnknownLootTable(id.to_string()))
    }

    /// 所有矿石声明过的品质名
    pub fn quality_names(&self) -> BTreeSet<&str> {
        self.ores
            .values()
            .flat_map(|ore| ore.qualities.keys().map(String::as_str))
            .collect()
    }

    /// 校验内容之间的引用与定义本身
    pub fn validate(&self) -> Result<(), ContentError> {
        for (key, def) in &self.monsters {
            check_key(key, &def.id)?;
            if def.max_hp <= 0 {
                return Err(invalid(&def.id, "max_hp must be positive"));
            }
            if let Some(table) = &def.loot_table {
                self.loot_table(table)?;
            }
        }

        for (key, def) in &self.ores {
            check_key(key, &def.id)?;
            if def.hardness < 0 {
                return Err(invalid(&def.id, "hardness must not be negative"));
            }
            if let Some((name, _)) = def.qualities.iter().find(|(_, (lo, hi))| lo > hi) {
                return Err(invalid(&def.id, &format!("quality `{name}` has an empty range")));
            }
        }

        for (key, def) in &self.items {
            check_key(key, &def.id)?;
        }

        for (key, table) in &self.loot_tables {
            check_key(key, &table.id)?;
            for entry in &table.entries {
                self.item(&entry.item)?;
                if !(0.0..=1.0).contains(&entry.chance) {
                    return Err(invalid(&table.id, "drop chance must be within 0..=1"));
                }
            }
        }

        let qualities = self.quality_names();
        for (key, def) in &self.recipes {
            check_key(key, &def.id)?;
            self.ore(&def.resource)?;
            if def.count == 0 {
                return Err(invalid(&def.id, "recipe must consume at least one resource"));
            }
            for (stat, formula) in &def.stats {
                if !RECIPE_STATS.contains(&stat.as_str()) {
                    return Err(invalid(&def.id, &format!("unsupported output stat `{stat}`")));
                }
                formula.validate_inputs(&format!("{}.{}", def.id, stat), qualities.iter().copied())?;
            }
        }
        Ok(())
    }

    /// 校验配置中引用的内容与公式输入
    pub fn validate_config(&self, config: &SimConfig) -> Result<(), ContentError> {
        if config.map_width < MIN_MAP_SIDE || config.map_height < MIN_MAP_SIDE {
            return Err(ContentError::InvalidDefinition {
                id: "map".into(),
                reason: format!(
                    "map must be at least {MIN_MAP_SIDE}x{MIN_MAP_SIDE}, got {}x{}",
                    config.map_width, config.map_height
                ),
            });
        }
        config
            .combat
            .damage_formula
            .validate_inputs("combat.damage_formula", DAMAGE_INPUTS)?;
        config
            .mining
            .turns_formula
            .validate_inputs("mining.turns_formula", MINING_INPUTS)?;

        for (i, table) in config.spawn.monster_tables.iter().enumerate() {
            check_weights(&format!("spawn.monster_tables[{i}]"), &table.weights)?;
            for (id, _) in &table.weights {
                self.monster(id)?;
            }
        }
        for (i, table) in config.spawn.ore_tables.iter().enumerate() {
            check_weights(&format!("spawn.ore_tables[{i}]"), &table.weights)?;
            for (id, _) in &table.weights {
                self.ore(id)?;
            }
        }
        if config.spawn.monster_tables.is_empty() {
            return Err(ContentError::EmptyWeightTable("spawn.monster_tables".into()));
        }
        if config.spawn.ore_tables.is_empty() {
            return Err(ContentError::EmptyWeightTable("spawn.ore_tables".into()));
        }
        self.loot_table(&config.spawn.treasure_loot_table)?;
        Ok(())
    }

    /// 内置内容
    pub fn builtin() -> Self {
        let mut content = Self::default();

        let monsters = [
            ("rat", "rat", 6, 3, 0, 3, "aggressive", Some("vermin")),
            ("bat", "cave bat", 4, 2, 0, 2, "passive", None),
            ("cave_mole", "cave mole", 5, 1, 1, 2, "coward", Some("vermin")),
            ("kobold", "kobold", 10, 4, 1, 6, "aggressive", Some("kobold")),
            ("cave_crab", "cave crab", 12, 3, 3, 6, "defensive", None),
            ("goblin", "goblin", 14, 5, 2, 10, "aggressive", Some("goblin")),
            ("golem", "stone golem", 24, 6, 4, 20, "guard", Some("golem")),
            ("wraith", "wraith", 18, 7, 2, 18, "aggressive", None),
        ];
        for (id, name, max_hp, attack, defense, xp_value, behavior, loot) in monsters {
            content.add_monster(MonsterDef {
                id: id.into(),
                name: name.into(),
                max_hp,
                attack,
                defense,
                xp_value,
                behavior: behavior.into(),
                loot_table: loot.map(str::to_string),
            });
        }

        let ores: [(&str, &str, i64, &[(&str, f64, f64)]); 3] = [
            ("copper", "copper", 2, &[("purity", 0.2, 0.6), ("density", 0.3, 0.7)]),
            ("iron", "iron", 3, &[("purity", 0.3, 0.8), ("density", 0.5, 0.9)]),
            (
                "mithril",
                "mithril",
                5,
                &[("purity", 0.6, 1.0), ("density", 0.1, 0.4), ("luster", 0.5, 1.0)],
            ),
        ];
        for (id, name, hardness, qualities) in ores {
            content.add_ore(OreDef {
                id: id.into(),
                name: name.into(),
                hardness,
                qualities: qualities.iter().map(|(q, lo, hi)| (q.to_string(), (*lo, *hi))).collect(),
            });
        }

        let items = [
            ("gold_coins", "gold coins", "gold", None, 0, 0),
            ("ruby", "ruby", "gem", None, 0, 0),
            ("rusty_dagger", "rusty dagger", "weapon", Some(EquipSlot::Weapon), 1, 0),
            ("short_sword", "short sword", "weapon", Some(EquipSlot::Weapon), 2, 0),
            ("leather_armor", "leather armor", "armor", Some(EquipSlot::Armor), 0, 1),
            ("chain_mail", "chain mail", "armor", Some(EquipSlot::Armor), 0, 2),
        ];
        for (id, name, item_type, slot, attack_bonus, defense_bonus) in items {
            content.add_item(ItemDef {
                id: id.into(),
                name: name.into(),
                item_type: item_type.into(),
                slot,
                attack_bonus,
                defense_bonus,
            });
        }

        let tables: [(&str, &[(&str, f64)]); 5] = [
            ("vermin", &[("gold_coins", 0.3)]),
            ("kobold", &[("gold_coins", 0.5), ("rusty_dagger", 0.15)]),
            ("goblin", &[("gold_coins", 0.6), ("short_sword", 0.1), ("leather_armor", 0.1)]),
            ("golem", &[("gold_coins", 1.0), ("chain_mail", 0.2)]),
            (
                "treasure",
                &[("gold_coins", 1.0), ("ruby", 0.4), ("short_sword", 0.2), ("leather_armor", 0.2)],
            ),
        ];
        for (id, entries) in tables {
            content.add_loot_table(LootTable {
                id: id.into(),
                entries: entries
                    .iter()
                    .map(|(item, chance)| LootEntry {
                        item: item.to_string(),
                        chance: *chance,
                    })
                    .collect(),
            });
        }

        let recipes = [
            (
                "copper_blade",
                "copper blade",
                "copper",
                2,
                EquipSlot::Weapon,
                keys::ATTACK_BONUS,
                Formula::linear(1.0, &[("purity", 3.0)]).clamped(Some(1.0), None),
            ),
            (
                "iron_sword",
                "iron sword",
                "iron",
                3,
                EquipSlot::Weapon,
                keys::ATTACK_BONUS,
                Formula::linear(2.0, &[("purity", 4.0), ("density", 1.0)]),
            ),
            (
                "iron_plate",
                "iron plate",
                "iron",
                3,
                EquipSlot::Armor,
                keys::DEFENSE_BONUS,
                Formula::linear(1.0, &[("density", 3.0)]),
            ),
            (
                "mithril_edge",
                "mithril edge",
                "mithril",
                2,
                EquipSlot::Weapon,
                keys::ATTACK_BONUS,
                Formula::linear(4.0, &[("purity", 4.0), ("luster", 2.0)]),
            ),
        ];
        for (id, name, resource, count, slot, stat, formula) in recipes {
            let item_type = match slot {
                EquipSlot::Weapon => "weapon",
                EquipSlot::Armor => "armor",
            };
            content.add_recipe(RecipeDef {
                id: id.into(),
                name: name.into(),
                resource: resource.into(),
                count,
                output_name: name.into(),
                item_type: item_type.into(),
                slot: Some(slot),
                stats: BTreeMap::from([(stat.to_string(), formula)]),
            });
        }

        content
    }
}

fn check_key(key: &str, id: &str) -> Result<(), ContentError> {
    if key == id {
        Ok(())
    } else {
        Err(invalid(id, &format!("registered under mismatched key `{key}`")))
    }
}

fn check_weights(name: &str, weights: &[(String, f64)]) -> Result<(), ContentError> {
    if weights.iter().any(|(_, w)| *w > 0.0) && weights.iter().all(|(_, w)| *w >= 0.0) {
        Ok(())
    } else {
        Err(ContentError::EmptyWeightTable(name.to_string()))
    }
}

fn invalid(id: &str, reason: &str) -> ContentError {
    ContentError::InvalidDefinition {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}
