//! Logging configuration and setup for the tile host.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. JSON output is used
/// when either the configuration or the CLI asks for it.
///
/// # Arguments
///
/// * `config` - Logging settings from the config file
/// * `json_format` - Forces JSON output (CLI override)
///
/// # Returns
///
/// `Ok(())` once the subscriber is installed, or an error if a global
/// subscriber was already set.
///
/// # Features
///
/// * **Environment variable support** - Respects `RUST_LOG` if set
/// * **Flexible formatting** - Human-readable or JSON output
/// * **Thread information** - Includes thread IDs and names
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_target(false),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner() {
    info!("╔══════════════════════════════════════════╗");
    info!("║            🧱 TILE HOST 🧱               ║");
    info!("║        tile_event_system v{:<15}║", tile_event_system::VERSION);
    info!("║                                          ║");
    info!("║  🎯 Typed events, priority dispatch      ║");
    info!("║  🛡️  Fault-isolated script handlers       ║");
    info!("║  🔄 Hot-reloadable script modules        ║");
    info!("╚══════════════════════════════════════════╝");
}
