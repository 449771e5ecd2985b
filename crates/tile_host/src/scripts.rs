//! Demo script modules loaded by the host.
//!
//! Each module registers through its own scope, so the host can unload or
//! hot-reload any of them without touching the others.

use crate::systems::LAVA_TILE;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tile_event_system::{
    priority, Cancellable, EntityId, HandlerError, MovementBlockedEvent, NpcInteractionEvent, ScriptContext,
    ScriptError, ScriptModule, TickEvent, TileSteppedOnEvent, TileSteppingOnEvent,
};
use tracing::{debug, info};

/// Refuses every step onto a lava tile.
pub struct LavaGuard;

impl ScriptModule for LavaGuard {
    fn name(&self) -> &str {
        "lava_guard"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn register(&mut self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
        context.subscribe(priority::VALIDATION, |event: &mut TileSteppingOnEvent| {
            if event.tile_type == LAVA_TILE {
                event.request_cancel(Some("lava"));
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// Step and block counts shared between the step counter and the host.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StepTally {
    pub steps: BTreeMap<u64, u64>,
    pub blocked: BTreeMap<String, u64>,
}

pub type SharedTally = Arc<Mutex<StepTally>>;

/// Analytics script counting completed steps per entity and blocks per
/// reason. Reloaded periodically by the host; the tally survives reloads.
pub struct StepCounter {
    tally: SharedTally,
}

impl StepCounter {
    pub fn new(tally: SharedTally) -> Self {
        Self { tally }
    }
}

impl ScriptModule for StepCounter {
    fn name(&self) -> &str {
        "step_counter"
    }

    fn version(&self) -> &str {
        "1.2.0"
    }

    fn register(&mut self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
        let generation = context.generation();

        let tally = self.tally.clone();
        context.subscribe(priority::ANALYTICS, move |event: &mut TileSteppedOnEvent| {
            let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
            *tally.steps.entry(event.entity.raw()).or_default() += 1;
            Ok(())
        })?;

        let tally = self.tally.clone();
        context.subscribe(priority::ANALYTICS, move |event: &mut MovementBlockedEvent| {
            let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
            *tally.blocked.entry(event.reason.clone()).or_default() += 1;
            Ok(())
        })?;

        debug!("📈 Step counter registered (generation {})", generation);
        Ok(())
    }
}

/// Greets whoever bumps into one of its NPCs.
pub struct NpcGreeter {
    npcs: Vec<EntityId>,
    greetings: Arc<AtomicU64>,
}

impl NpcGreeter {
    pub fn new(npcs: Vec<EntityId>, greetings: Arc<AtomicU64>) -> Self {
        Self { npcs, greetings }
    }
}

impl ScriptModule for NpcGreeter {
    fn name(&self) -> &str {
        "npc_greeter"
    }

    fn version(&self) -> &str {
        "0.9.1"
    }

    fn register(&mut self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
        for npc in &self.npcs {
            let greetings = self.greetings.clone();
            context.subscribe_entity(*npc, priority::COSMETIC, move |event: &mut NpcInteractionEvent| {
                greetings.fetch_add(1, Ordering::Relaxed);
                info!("👋 {} says hello to {} at {}", event.npc, event.player, event.npc_tile);
                Ok(())
            })?;
        }
        Ok(())
    }
}

/// A badly written script: its tick handler fails every `fail_every` ticks.
/// The bus logs the fault and keeps dispatching to everyone else.
pub struct Glitchy {
    fail_every: u64,
}

impl Glitchy {
    pub fn new(fail_every: u64) -> Self {
        Self {
            fail_every: fail_every.max(1),
        }
    }
}

impl ScriptModule for Glitchy {
    fn name(&self) -> &str {
        "glitchy"
    }

    fn register(&mut self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
        let fail_every = self.fail_every;
        let seen = AtomicU64::new(0);
        context.subscribe(priority::NORMAL, move |event: &mut TickEvent| {
            let count = seen.fetch_add(1, Ordering::Relaxed) + 1;
            if count % fail_every == 0 {
                return Err(HandlerError::failed(format!(
                    "lost track of the clock at frame {}",
                    event.frame
                )));
            }
            Ok(())
        })?;
        Ok(())
    }
}
