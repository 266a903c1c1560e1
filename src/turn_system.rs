//! Turn processor driving everything that happens after a turn-consuming
//! player action.
//!
//! One call to [`TurnProcessor::advance`] runs, in order:
//! 1. the turn counter increment,
//! 2. periodic regeneration,
//! 3. every AI actor in ascending id order,
//! 4. removal of dead non-player entities,
//! 5. the defeat and victory checks.
//!
//! Once the game has ended the processor stays in `Terminated` and further
//! calls are no-ops.

use serde::{Deserialize, Serialize};

use crate::actions::{ActionContext, Outcome};
use crate::ai::AiEngine;
use crate::config::SimConfig;
use crate::entity::{EntityId, attr_map};
use crate::event_bus::{Event, EventBus, EventKind};
use crate::world::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    /// Waiting for the next player action.
    Idle,
    /// AI and upkeep are running.
    Advancing,
    /// The turn finished and the game goes on.
    Continue,
    /// Defeat or victory was reached.
    Terminated,
}

/// Summary of one call to `advance`.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub state: TurnState,
    pub turn: u64,
    pub ai_outcomes: Vec<(EntityId, Outcome)>,
    pub regenerated: bool,
    pub purged: Vec<EntityId>,
}

#[derive(Debug, Clone)]
pub struct TurnProcessor {
    pub state: TurnState,
    ai: AiEngine,
}

impl TurnProcessor {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            state: TurnState::Idle,
            ai: AiEngine::new(config.pathfinding.clone()),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state == TurnState::Terminated
    }

    /// Restores the state for a world loaded from a save.
    pub fn sync_with(&mut self, world: &WorldState) {
        self.state = if world.game_over {
            TurnState::Terminated
        } else {
            TurnState::Idle
        };
    }

    pub fn advance(&mut self, world: &mut WorldState, ctx: &ActionContext, bus: &mut EventBus) -> TurnReport {
        if self.is_terminated() || world.game_over {
            self.state = TurnState::Terminated;
            return TurnReport {
                state: self.state,
                turn: world.turn,
                ai_outcomes: Vec::new(),
                regenerated: false,
                purged: Vec::new(),
            };
        }
        self.state = TurnState::Advancing;
        world.turn += 1;

        let regenerated = apply_regeneration(world, ctx.config);

        let ai_outcomes = self.ai.run_turn(world, ctx);
        for (_, outcome) in &ai_outcomes {
            for message in &outcome.messages {
                world.log(message.clone());
            }
            bus.publish_records(outcome.events.iter().cloned(), world.turn);
        }

        let purged = world.purge_dead();
        bus.publish(Event::new(
            EventKind::TurnAdvanced,
            attr_map([("turn", world.turn.into()), ("floor", world.floor.into())]),
            world.turn,
        ));

        self.evaluate_terminal(world, ctx.config, bus);
        if !self.is_terminated() {
            self.state = TurnState::Continue;
        }
        tracing::debug!(turn = world.turn, state = ?self.state, purged = purged.len(), "turn advanced");

        TurnReport {
            state: self.state,
            turn: world.turn,
            ai_outcomes,
            regenerated,
            purged,
        }
    }

    /// Defeat takes priority over victory when both happen on the same turn.
    pub fn evaluate_terminal(&mut self, world: &mut WorldState, config: &SimConfig, bus: &mut EventBus) {
        if world.game_over {
            self.state = TurnState::Terminated;
            return;
        }
        if !world.player.is_alive() {
            world.game_over = true;
            world.victory = false;
            world.log(format!("You were slain on depth {} after {} turns.", world.floor, world.turn));
            bus.publish(Event::new(
                EventKind::GameOver,
                attr_map([("floor", world.floor.into()), ("turn", world.turn.into())]),
                world.turn,
            ));
        } else if world.floor >= config.victory_floor {
            world.game_over = true;
            world.victory = true;
            world.log(format!("You reached depth {}. Victory!", world.floor));
            bus.publish(Event::new(
                EventKind::Victory,
                attr_map([("floor", world.floor.into()), ("turn", world.turn.into())]),
                world.turn,
            ));
        } else {
            return;
        }
        tracing::info!(victory = world.victory, floor = world.floor, turn = world.turn, "game over");
        self.state = TurnState::Terminated;
    }
}

/// Heals every living entity with hit points every `interval` turns.
fn apply_regeneration(world: &mut WorldState, config: &SimConfig) -> bool {
    let regen = &config.regen;
    if regen.interval == 0 || world.turn % regen.interval != 0 {
        return false;
    }
    world.player.heal(regen.amount);
    let ids: Vec<EntityId> = world.entities().filter(|e| e.attackable).map(|e| e.id).collect();
    for id in ids {
        if let Some(entity) = world.get_mut(id) {
            entity.heal(regen.amount);
        }
    }
    true
}
