//! Extension point for actions defined outside the core rule set.
//!
//! A hook is registered under a name and invoked through `CustomAction`.
//! Errors returned by a hook, and panics raised inside one, become a
//! failed outcome like any other execution error. The world is restored
//! to its state before the call when a hook fails.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};

use crate::entity::{AttrMap, EntityId, attr_map};
use crate::event_bus::EventKind;
use crate::world::WorldState;

use super::{ActionContext, ActionError, ActionHandler, Outcome, Rejection};

pub trait ActionHook {
    /// Read-only legality check.
    fn validate(&self, world: &WorldState, actor: EntityId, params: &AttrMap) -> bool;

    fn execute(&self, world: &mut WorldState, actor: EntityId, params: &AttrMap) -> anyhow::Result<Outcome>;
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: BTreeMap<String, Box<dyn ActionHook>>,
}

impl HookRegistry {
    pub fn register(&mut self, name: &str, hook: Box<dyn ActionHook>) {
        if self.hooks.insert(name.to_string(), hook).is_some() {
            tracing::warn!(hook = name, "replacing previously registered action hook");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ActionHook> {
        self.hooks.get(name).map(Box::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAction {
    pub actor: EntityId,
    pub hook: String,
    #[serde(default)]
    pub params: AttrMap,
}

impl ActionHandler for CustomAction {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn actor(&self) -> EntityId {
        self.actor
    }

    fn check(&self, world: &WorldState, ctx: &ActionContext) -> Result<(), Rejection> {
        let hook = ctx
            .hooks
            .get(&self.hook)
            .ok_or_else(|| Rejection::invalid(format!("Unknown action `{}`.", self.hook)))?;
        if !world.get(self.actor).is_some_and(|a| a.is_alive()) {
            return Err(Rejection::invalid(format!("Actor {} cannot act.", self.actor)));
        }
        if !hook.validate(world, self.actor, &self.params) {
            return Err(Rejection::failure(format!("You cannot {} right now.", self.hook)));
        }
        Ok(())
    }

    fn execute(&self, world: &mut WorldState, ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let hook = ctx
            .hooks
            .get(&self.hook)
            .ok_or_else(|| ActionError::MalformedRequest(format!("hook `{}` vanished", self.hook)))?;
        let snapshot = world.clone();
        let result = match catch_unwind(AssertUnwindSafe(|| hook.execute(world, self.actor, &self.params))) {
            Ok(result) => result,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(anyhow::anyhow!("hook panicked: {reason}"))
            }
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(source) => {
                *world = snapshot;
                return Err(ActionError::Hook {
                    hook: self.hook.clone(),
                    source,
                });
            }
        };
        Ok(outcome.event(
            EventKind::HookExecuted,
            attr_map([("entity", self.actor.into()), ("hook", self.hook.as_str().into())]),
        ))
    }
}
