//! # Tile Host
//!
//! Tick-driven host for the tile event system. Drives a small demo world
//! through the bus, loads script modules that react to (and veto) what
//! happens in it, and hot-reloads one of them periodically.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration until Ctrl+C
//! tile-host
//!
//! # Run 200 ticks quickly with debug logging
//! tile-host --ticks 200 --tick-ms 5 --log-level debug
//!
//! # JSON logging
//! tile-host --json-logs
//! ```
//!
//! The host loads its configuration from a TOML file (default:
//! `tile_host.toml`), writing a default one if it does not exist.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod scripts;
pub mod signals;
pub mod systems;

use app::Application;
use cli::CliArgs;
use config::AppConfig;
use tracing::{error, info};

/// Parses arguments, loads configuration, sets up logging and runs the host.
///
/// # Exit Codes
///
/// * **0**: ran to the tick limit or a shutdown signal
/// * **1**: configuration, startup or runtime error
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let mut config = match AppConfig::load_from_file(&args.config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {e}", args.config_path.display());
            std::process::exit(1);
        }
    };
    config.apply_overrides(&args);

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }
    logging::display_banner();
    info!("🔧 Configuration loaded from {}", args.config_path.display());

    match Application::new(config) {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use app::RunSummary;
pub use config::{LoggingSettings, SimulationSettings};
