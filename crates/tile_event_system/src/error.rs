//! Error types for the tile event system

use crate::types::ScopeId;

/// Error returned by (or synthesised for) a subscribed handler.
///
/// Handler errors never reach the producer that called `publish`; the bus
/// logs them and records them in the [`PublishOutcome`](crate::PublishOutcome).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Handler execution failed
    #[error("Handler execution failed: {0}")]
    Failed(String),

    /// Handler refused the event as malformed or out of range
    #[error("Handler rejected event: {0}")]
    Rejected(String),

    /// Handler panicked; the panic was caught at the handler boundary
    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Errors raised by the event bus itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The scope was already disposed and no longer accepts subscriptions
    #[error("Scope {name} ({id}) is disposed")]
    ScopeDisposed { id: ScopeId, name: String },

    /// The scope was created by a different bus
    #[error("Scope {name} ({id}) belongs to another event bus")]
    ForeignScope { id: ScopeId, name: String },

    /// The event type cannot carry the requested filter key
    #[error("Event type '{event_type}' does not support {filter} filters")]
    UnsupportedFilter {
        event_type: &'static str,
        filter: &'static str,
    },

    /// Reentrant publish of the same event type exceeded the depth limit
    #[error("Cyclic publish of '{event_type}' aborted at depth {max_depth}")]
    CyclicPublish {
        event_type: &'static str,
        max_depth: usize,
    },

    /// Bus configuration is invalid
    #[error("Invalid bus configuration: {0}")]
    InvalidConfig(String),

    /// Registry slot for a type key holds subscribers of another type
    #[error("Registry entry for '{0}' is corrupted")]
    RegistryCorrupted(&'static str),
}

/// Errors raised while loading, unloading or reloading script modules.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// A module with that name is already loaded
    #[error("Script module already loaded: {0}")]
    AlreadyLoaded(String),

    /// No module with that name is loaded
    #[error("Script module not loaded: {0}")]
    NotLoaded(String),

    /// The module's registration phase returned an error
    #[error("Script registration failed for {module}: {reason}")]
    RegistrationFailed { module: String, reason: String },

    /// The module panicked during registration
    #[error("Script module {module} panicked: {message}")]
    Panicked { module: String, message: String },

    /// Event bus error
    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),
}
