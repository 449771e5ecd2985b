//! Event bus configuration

use crate::error::BusError;
use serde::{Deserialize, Serialize};

/// Default limit on nested same-type publishes.
pub const DEFAULT_MAX_PUBLISH_DEPTH: usize = 32;

/// Default number of revoked entries a type accumulates before compaction.
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 16;

/// Limits and toggles for an [`EventBus`](crate::EventBus).
///
/// Deserialises from a `[bus]` table with every field optional:
///
/// ```toml
/// [bus]
/// max_publish_depth = 32
/// compaction_threshold = 16
/// trace_dispatch = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Nested publishes of one event type allowed before the chain is
    /// treated as a cyclic storm and aborted
    pub max_publish_depth: usize,
    /// Revoked subscriptions per type that trigger compaction at the next
    /// outermost publish of that type
    pub compaction_threshold: usize,
    /// Emit a `trace!` line for every handler invocation
    pub trace_dispatch: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_publish_depth: DEFAULT_MAX_PUBLISH_DEPTH,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            trace_dispatch: false,
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), BusError> {
        if self.max_publish_depth == 0 {
            return Err(BusError::InvalidConfig(
                "max_publish_depth must be at least 1".to_string(),
            ));
        }
        if self.compaction_threshold == 0 {
            return Err(BusError::InvalidConfig(
                "compaction_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BusConfig::default();
        assert_eq!(config.max_publish_depth, 32);
        assert_eq!(config.compaction_threshold, 16);
        assert!(!config.trace_dispatch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = BusConfig {
            max_publish_depth: 0,
            ..BusConfig::default()
        };
        assert!(matches!(config.validate(), Err(BusError::InvalidConfig(_))));

        let config = BusConfig {
            compaction_threshold: 0,
            ..BusConfig::default()
        };
        assert!(matches!(config.validate(), Err(BusError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BusConfig = toml::from_str("max_publish_depth = 8").unwrap();
        assert_eq!(config.max_publish_depth, 8);
        assert_eq!(config.compaction_threshold, DEFAULT_COMPACTION_THRESHOLD);

        let config: BusConfig = toml::from_str("").unwrap();
        assert_eq!(config, BusConfig::default());
    }
}
