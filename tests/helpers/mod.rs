//! Test helpers for building small hand-made worlds.
//!
//! `TestWorldBuilder` lays out an open arena surrounded by walls so tests
//! can place entities at exact coordinates without depending on the
//! dungeon generator.

#![allow(dead_code)]

use deepforge::actions::{ActionContext, HookRegistry};
use deepforge::ai::{AiState, Behavior};
use deepforge::content::ContentRegistry;
use deepforge::entity::{Entity, EntityId};
use deepforge::event_bus::EventBus;
use deepforge::turn_system::{TurnProcessor, TurnReport};
use deepforge::{Action, Outcome, SimConfig, WorldState};
use dungeon::{Level, Pos, SeededRng, TileKind};

pub struct TestWorld {
    pub world: WorldState,
    pub content: ContentRegistry,
    pub config: SimConfig,
    pub hooks: HookRegistry,
    pub bus: EventBus,
    pub turns: TurnProcessor,
}

impl TestWorld {
    pub fn ctx(&self) -> ActionContext<'_> {
        ActionContext {
            content: &self.content,
            config: &self.config,
            hooks: &self.hooks,
        }
    }

    pub fn player(&self) -> EntityId {
        self.world.player_id()
    }

    pub fn exec(&mut self, action: Action) -> Outcome {
        let ctx = ActionContext {
            content: &self.content,
            config: &self.config,
            hooks: &self.hooks,
        };
        action.execute(&mut self.world, &ctx)
    }

    pub fn advance(&mut self) -> TurnReport {
        let ctx = ActionContext {
            content: &self.content,
            config: &self.config,
            hooks: &self.hooks,
        };
        self.turns.advance(&mut self.world, &ctx, &mut self.bus)
    }

    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        self.world.spawn(entity)
    }

    /// Spawns a monster with the given behaviour and no loot.
    pub fn monster(&mut self, name: &str, pos: Pos, hp: i32, attack: i32, defense: i32, behavior: Behavior) -> EntityId {
        self.world.spawn(
            Entity::monster(name, hp, attack, defense)
                .at(pos)
                .with_ai(AiState::new(behavior, pos)),
        )
    }

    /// Spawns an ore item directly into the player's pack.
    pub fn give_ore(&mut self, resource: &str, qualities: &[(&str, f64)]) -> EntityId {
        let mut ore = Entity::item(format!("{resource} ore"), "ore")
            .with_attr(deepforge::entity::keys::RESOURCE_TYPE, resource);
        for (name, value) in qualities {
            ore.set_quality(name, *value);
        }
        let id = self.world.spawn(ore);
        self.world.player.inventory.push(id);
        id
    }

    pub fn pos_of(&self, id: EntityId) -> Option<Pos> {
        self.world.get(id).and_then(|e| e.position)
    }
}

pub struct TestWorldBuilder {
    width: i32,
    height: i32,
    seed: u64,
    player_pos: Pos,
    player_stats: (i32, i32, i32),
    config: SimConfig,
    walls: Vec<Pos>,
    stairs_down: Option<Pos>,
}

impl TestWorldBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            width: 12,
            height: 12,
            seed,
            player_pos: (2, 2),
            player_stats: (30, 5, 2),
            config: SimConfig::default(),
            walls: Vec::new(),
            stairs_down: None,
        }
    }

    pub fn size(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_player_at(mut self, pos: Pos) -> Self {
        self.player_pos = pos;
        self
    }

    pub fn with_player_stats(mut self, max_hp: i32, attack: i32, defense: i32) -> Self {
        self.player_stats = (max_hp, attack, defense);
        self
    }

    pub fn with_wall(mut self, pos: Pos) -> Self {
        self.walls.push(pos);
        self
    }

    pub fn with_stairs_down(mut self, pos: Pos) -> Self {
        self.stairs_down = Some(pos);
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut SimConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn build(self) -> TestWorld {
        let mut level = Level::filled(self.width, self.height, 1);
        for y in 1..self.height - 1 {
            for x in 1..self.width - 1 {
                level.set_kind(x, y, TileKind::Floor);
            }
        }
        for (x, y) in &self.walls {
            level.set_kind(*x, *y, TileKind::Wall);
        }
        if let Some((x, y)) = self.stairs_down {
            level.set_kind(x, y, TileKind::StairsDown);
        }

        let (max_hp, attack, defense) = self.player_stats;
        let player = Entity::player("Tester", max_hp, attack, defense).at(self.player_pos);
        let world = WorldState::new(SeededRng::new(self.seed), level, player, self.config.message_log_capacity);
        TestWorld {
            world,
            content: ContentRegistry::builtin(),
            turns: TurnProcessor::new(&self.config),
            config: self.config,
            hooks: HookRegistry::default(),
            bus: EventBus::new(),
        }
    }
}
