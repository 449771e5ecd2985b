//! Application lifecycle: bus construction, script loading, tick loop and
//! shutdown reporting.

use crate::config::AppConfig;
use crate::scripts::{Glitchy, LavaGuard, NpcGreeter, SharedTally, StepCounter};
use crate::signals;
use crate::systems::{MovementSystem, StepReport};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tile_event_system::{BusStats, EventBus, ScriptHost, TickEvent};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Totals accumulated over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub moves: usize,
    pub blocked: usize,
    pub interactions: usize,
    pub reloads: u64,
}

impl RunSummary {
    fn absorb(&mut self, report: StepReport) {
        self.moves += report.moved;
        self.blocked += report.blocked;
        self.interactions += report.interactions;
    }
}

/// Owns the bus, the script host and the gameplay systems.
pub struct Application {
    config: AppConfig,
    bus: Arc<EventBus>,
    host: ScriptHost,
    world: MovementSystem,
    tally: SharedTally,
    greetings: Arc<AtomicU64>,
}

impl Application {
    /// Builds the bus from the validated configuration and loads the demo
    /// scripts. A script that fails to load is logged and skipped.
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let bus = Arc::new(EventBus::with_config(config.bus.clone())?);
        let host = ScriptHost::new(bus.clone());
        let world = MovementSystem::new(&config.simulation);
        let tally = SharedTally::default();
        let greetings = Arc::new(AtomicU64::new(0));

        let app = Self {
            config,
            bus,
            host,
            world,
            tally,
            greetings,
        };
        app.load_scripts();
        Ok(app)
    }

    fn load_scripts(&self) {
        let modules: Vec<Box<dyn tile_event_system::ScriptModule>> = vec![
            Box::new(LavaGuard),
            Box::new(StepCounter::new(self.tally.clone())),
            Box::new(NpcGreeter::new(self.world.npc_ids(), self.greetings.clone())),
            Box::new(Glitchy::new(97)),
        ];
        for module in modules {
            let name = module.name().to_string();
            if let Err(e) = self.host.load(module) {
                error!("❌ Script '{}' failed to load: {}", name, e);
            }
        }
        info!(
            "🔌 {} scripts loaded: {:?}",
            self.host.module_count(),
            self.host.module_names()
        );
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn host(&self) -> &ScriptHost {
        &self.host
    }

    /// Configured time between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.simulation.tick_interval_ms)
    }

    /// Runs one tick: the tick event, then movement, then any scheduled reload.
    ///
    /// `delta_seconds` is the time since the previous tick as measured by the
    /// loop, which exceeds the configured interval after a skipped tick.
    pub fn tick(&mut self, frame: u64, delta_seconds: f32, summary: &mut RunSummary) {
        let outcome = self.bus.publish(&mut TickEvent::new(delta_seconds, frame));
        if !outcome.faults.is_empty() {
            warn!("⚠️ Tick {} had {} handler faults", frame, outcome.faults.len());
        }

        let report = self.world.step(&self.bus, frame);
        summary.absorb(report);
        summary.ticks = frame;

        let reload_every = self.config.simulation.reload_every_ticks;
        if reload_every > 0 && frame % reload_every == 0 {
            match self.host.reload(Box::new(StepCounter::new(self.tally.clone()))) {
                Ok(info) => {
                    summary.reloads += 1;
                    info!("🔄 Hot-reloaded '{}' (generation {})", info.name, info.generation);
                }
                Err(e) => error!("❌ Hot reload failed: {}", e),
            }
        }
    }

    /// Runs the tick loop until the tick limit or a shutdown signal.
    pub async fn run(mut self) -> Result<RunSummary, Box<dyn std::error::Error>> {
        let sim = &self.config.simulation;
        info!(
            "🌟 Starting tick loop: {}ms per tick, {}x{} grid, {} walkers",
            sim.tick_interval_ms,
            sim.grid_width,
            sim.grid_height,
            self.world.walker_ids().len()
        );
        let max_ticks = sim.max_ticks;
        let nominal = self.tick_interval();
        let mut interval = tokio::time::interval(nominal);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let shutdown = signals::wait_for_shutdown();
        tokio::pin!(shutdown);

        let mut summary = RunSummary::default();
        let mut frame = 0u64;
        let mut last_tick: Option<Instant> = None;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    let delta = tick_delta(last_tick, now, nominal);
                    last_tick = Some(now);
                    frame += 1;
                    self.tick(frame, delta, &mut summary);
                    if max_ticks > 0 && frame >= max_ticks {
                        info!("🏁 Reached tick limit ({})", max_ticks);
                        break;
                    }
                }
                result = &mut shutdown => {
                    result?;
                    break;
                }
            }
        }

        self.shutdown(&summary)?;
        Ok(summary)
    }

    fn shutdown(&self, summary: &RunSummary) -> Result<(), Box<dyn std::error::Error>> {
        info!("🛑 Unloading scripts...");
        let unloaded = self.host.unload_all();
        let compacted = self.bus.compact();
        info!("✅ Unloaded {} scripts, compacted {} subscriptions", unloaded, compacted);

        log_final_stats(&self.bus.stats(), summary);
        let tally = self
            .tally
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        info!("📈 Step tally: {}", serde_json::to_string(&tally)?);
        info!("👋 Tile host shutdown complete");
        Ok(())
    }
}

/// Seconds since the previous tick, or the nominal interval for the first one.
fn tick_delta(last: Option<Instant>, now: Instant, nominal: Duration) -> f32 {
    last.map_or(nominal, |last| now.saturating_duration_since(last))
        .as_secs_f32()
}

fn log_final_stats(stats: &BusStats, summary: &RunSummary) {
    info!("📊 Final Statistics:");
    info!("  - Ticks run: {}", summary.ticks);
    info!(
        "  - Moves: {}, blocked: {}, NPC interactions: {}",
        summary.moves, summary.blocked, summary.interactions
    );
    info!("  - Hot reloads: {}", summary.reloads);
    info!("  - Events published: {}", stats.events_published);
    info!("  - Handlers invoked: {}", stats.handlers_invoked);
    info!("  - Handler faults: {}", stats.handler_faults);
    info!("  - Cyclic publish aborts: {}", stats.cyclic_publish_aborts);
    match serde_json::to_string_pretty(stats) {
        Ok(json) => info!("📊 Bus stats:\n{}", json),
        Err(e) => warn!("⚠️ Could not serialise bus stats: {}", e),
    }
}
