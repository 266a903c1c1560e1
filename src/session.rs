//! 游戏会话：持有世界、配置、内容与事件总线，是外部驱动模拟的唯一入口。

use dungeon::{DungeonGenerator, SeedInput, SeededRng};
use error::GameError;

use crate::actions::{Action, ActionContext, ActionHook, ActionRequest, HookRegistry, Outcome};
use crate::config::SimConfig;
use crate::content::ContentRegistry;
use crate::entity::Entity;
use crate::event_bus::{EventBus, EventKind};
use crate::save::SaveData;
use crate::spawner;
use crate::turn_system::{TurnProcessor, TurnReport, TurnState};
use crate::world::WorldState;

/// 一次提交的结果
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub outcome: Outcome,
    /// 动作消耗了回合时才有
    pub turn: Option<TurnReport>,
}

#[derive(Debug)]
pub struct Session {
    pub world: WorldState,
    pub config: SimConfig,
    pub content: ContentRegistry,
    pub bus: EventBus,
    pub hooks: HookRegistry,
    turns: TurnProcessor,
    replay: Vec<ActionRequest>,
}

impl Session {
    /// 校验内容，生成第一层并放置实体
    pub fn new(seed: impl Into<SeedInput>, config: SimConfig, content: ContentRegistry) -> Result<Self, GameError> {
        content.validate()?;
        content.validate_config(&config)?;

        let mut rng = SeededRng::from_input(&seed.into());
        let generator = DungeonGenerator::new(config.generator.clone());
        let level = generator.generate(config.map_width, config.map_height, 1, &mut rng);
        let player = Entity::player(
            &config.player.name,
            config.player.max_hp,
            config.player.attack,
            config.player.defense,
        );
        let mut world = WorldState::new(rng, level, player, config.message_log_capacity);
        tracing::info!(seed = world.seed, "new session");

        spawner::place_player(&mut world, &config);
        spawner::populate_floor(&mut world, &content, &config)?;
        world.log(format!("{} enters the mine.", world.player.name));

        Ok(Self {
            turns: TurnProcessor::new(&config),
            world,
            config,
            content,
            bus: EventBus::new(),
            hooks: HookRegistry::default(),
            replay: Vec::new(),
        })
    }

    pub fn with_defaults(seed: impl Into<SeedInput>) -> Result<Self, GameError> {
        Self::new(seed, SimConfig::default(), ContentRegistry::builtin())
    }

    pub fn register_hook(&mut self, name: &str, hook: Box<dyn ActionHook>) {
        self.hooks.register(name, hook);
    }

    pub fn context(&self) -> ActionContext<'_> {
        ActionContext {
            content: &self.content,
            config: &self.config,
            hooks: &self.hooks,
        }
    }

    pub fn is_over(&self) -> bool {
        self.world.game_over
    }

    pub fn turn_state(&self) -> TurnState {
        self.turns.state
    }

    /// 已提交动作的请求记录，可用于回放
    pub fn replay_log(&self) -> &[ActionRequest] {
        &self.replay
    }

    /// 提交一个玩家动作；若消耗回合则推进回合
    pub fn submit(&mut self, action: Action) -> StepResult {
        if self.world.game_over {
            return StepResult {
                outcome: Outcome::invalid("The game is over."),
                turn: None,
            };
        }
        if action.actor() != self.world.player_id() {
            return StepResult {
                outcome: Outcome::invalid("Only the player's actions can be submitted."),
                turn: None,
            };
        }
        self.replay.push(action.to_request());

        let ctx = ActionContext {
            content: &self.content,
            config: &self.config,
            hooks: &self.hooks,
        };
        let outcome = action.execute(&mut self.world, &ctx);
        for message in &outcome.messages {
            self.world.log(message.clone());
        }
        self.bus.publish_records(outcome.events.iter().cloned(), self.world.turn);

        if outcome.has_event(EventKind::FloorTransition) {
            if let Err(err) = self.descend() {
                tracing::error!(error = %err, "failed to build the next floor");
                self.world.log(error::handle_error(&err));
            }
        }

        let turn = outcome.turn_consumed.then(|| self.advance());
        StepResult { outcome, turn }
    }

    /// 提交扁平请求，格式错误时返回无效结果
    pub fn submit_request(&mut self, request: &ActionRequest) -> StepResult {
        match Action::from_request(request) {
            Ok(action) => self.submit(action),
            Err(err) => {
                tracing::debug!(error = %err, "rejected malformed request");
                StepResult {
                    outcome: Outcome::invalid(err.to_string()),
                    turn: None,
                }
            }
        }
    }

    /// 推进一个回合(AI、恢复、清理、胜负判定)
    pub fn advance(&mut self) -> TurnReport {
        let ctx = ActionContext {
            content: &self.content,
            config: &self.config,
            hooks: &self.hooks,
        };
        self.turns.advance(&mut self.world, &ctx, &mut self.bus)
    }

    /// 生成下一层，玩家携带与装备的物品随之保留。
    /// 新层在副本上构建，全部成功后才替换当前世界；失败时世界保持原样
    fn descend(&mut self) -> Result<(), GameError> {
        let floor = self.world.floor + 1;
        let mut staged = self.world.clone();
        let generator = DungeonGenerator::new(self.config.generator.clone());
        let level = generator.generate(self.config.map_width, self.config.map_height, floor, &mut staged.rng);
        staged.enter_level(level);
        spawner::place_player(&mut staged, &self.config);
        spawner::populate_floor(&mut staged, &self.content, &self.config)?;
        self.world = staged;
        tracing::info!(floor, turn = self.world.turn, "entered new floor");
        Ok(())
    }

    pub fn save(&self) -> SaveData {
        SaveData::capture(&self.world)
    }

    /// 从存档恢复。内容与配置必须与存档时一致
    pub fn restore(data: SaveData, config: SimConfig, content: ContentRegistry) -> Result<Self, GameError> {
        content.validate()?;
        content.validate_config(&config)?;
        let world = data.into_world()?;
        let mut turns = TurnProcessor::new(&config);
        turns.sync_with(&world);
        tracing::info!(seed = world.seed, turn = world.turn, floor = world.floor, "session restored");
        Ok(Self {
            world,
            config,
            content,
            bus: EventBus::new(),
            hooks: HookRegistry::default(),
            turns,
            replay: Vec::new(),
        })
    }
}
