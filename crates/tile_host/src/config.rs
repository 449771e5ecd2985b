//! Configuration management for the tile host.
//!
//! Settings are loaded from a TOML file (a default one is written when the
//! file does not exist) and then selectively overridden from the command line.

use crate::cli::CliArgs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tile_event_system::BusConfig;
use tracing::info;

fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

fn default_grid_size() -> i32 {
    16
}

fn default_walkers() -> usize {
    4
}

fn default_reload_every() -> u64 {
    200
}

fn default_lava_tiles() -> Vec<[i32; 2]> {
    vec![[3, 3], [4, 3], [8, 9], [12, 5]]
}

fn default_npcs() -> Vec<[i32; 2]> {
    vec![[6, 6], [10, 2]]
}

/// Application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tick loop and demo world settings
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Event bus limits
    #[serde(default)]
    pub bus: BusConfig,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Tick loop and demo world configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Milliseconds between ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Stop after this many ticks (0 runs until a shutdown signal)
    #[serde(default)]
    pub max_ticks: u64,
    #[serde(default = "default_grid_size")]
    pub grid_width: i32,
    #[serde(default = "default_grid_size")]
    pub grid_height: i32,
    /// Number of wandering entities driven by the movement system
    #[serde(default = "default_walkers")]
    pub walkers: usize,
    /// Tiles the lava guard script refuses to let anyone step on
    #[serde(default = "default_lava_tiles")]
    pub lava_tiles: Vec<[i32; 2]>,
    /// Positions of stationary NPCs
    #[serde(default = "default_npcs")]
    pub npcs: Vec<[i32; 2]>,
    /// Hot-reload the step counter script every N ticks (0 disables)
    #[serde(default = "default_reload_every")]
    pub reload_every_ticks: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            max_ticks: 0,
            grid_width: default_grid_size(),
            grid_height: default_grid_size(),
            walkers: default_walkers(),
            lava_tiles: default_lava_tiles(),
            npcs: default_npcs(),
            reload_every_ticks: default_reload_every(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, writing the defaults there first if
    /// the file does not exist.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("📝 Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file settings.
    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(ticks) = args.ticks {
            self.simulation.max_ticks = ticks;
        }
        if let Some(tick_ms) = args.tick_ms {
            self.simulation.tick_interval_ms = tick_ms;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if let Some(depth) = args.max_depth {
            self.bus.max_publish_depth = depth;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let sim = &self.simulation;
        if sim.tick_interval_ms == 0 {
            return Err("simulation.tick_interval_ms must be greater than 0".to_string());
        }
        if sim.grid_width <= 0 || sim.grid_height <= 0 {
            return Err(format!(
                "Grid must be at least 1x1, got {}x{}",
                sim.grid_width, sim.grid_height
            ));
        }
        let in_grid = |[x, y]: &[i32; 2]| *x >= 0 && *y >= 0 && *x < sim.grid_width && *y < sim.grid_height;
        if let Some(tile) = sim.lava_tiles.iter().find(|&t| !in_grid(t)) {
            return Err(format!("Lava tile {tile:?} is outside the grid"));
        }
        if let Some(npc) = sim.npcs.iter().find(|&t| !in_grid(t)) {
            return Err(format!("NPC position {npc:?} is outside the grid"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        self.bus.validate().map_err(|e| e.to_string())
    }
}
