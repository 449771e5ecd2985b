//! # Event Contract
//!
//! The minimal shape every published value satisfies: a stable type key, a
//! unique id and creation timestamp, and optionally an entity and/or tile
//! identity the bus can use for filtered delivery.
//!
//! Cancellable events additionally embed a [`CancellationState`] and
//! implement [`Cancellable`]. Cancellation is advisory: the bus never stops
//! invoking handlers because an event was cancelled. The producer inspects
//! the flag after `publish` returns.

use crate::types::{EntityId, TilePosition};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

/// Reason recorded when `request_cancel` is called without one.
pub const DEFAULT_CANCEL_REASON: &str = "cancelled";

/// Trait that all published events implement.
///
/// The associated constants declare, per concrete type, whether the event
/// exposes an entity or tile identity. The bus checks them when a filtered
/// subscription is registered, so nothing is probed at dispatch time.
///
/// Most events implement this through [`impl_event!`](crate::impl_event).
pub trait Event: Send + Debug + 'static {
    /// Whether [`Event::entity`] can return `Some`.
    const CARRIES_ENTITY: bool = false;
    /// Whether [`Event::tile`] can return `Some`.
    const CARRIES_TILE: bool = false;

    /// Stable key naming this event type in logs and diagnostics.
    fn type_key() -> &'static str;

    /// Identity and creation time of this event instance.
    fn metadata(&self) -> &EventMetadata;

    /// Entity this event is about, used by entity-filtered subscriptions.
    fn entity(&self) -> Option<EntityId> {
        None
    }

    /// Tile this event is about, used by tile-filtered subscriptions.
    fn tile(&self) -> Option<TilePosition> {
        None
    }
}

/// Per-instance identity carried by every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique id of this event instance
    pub id: Uuid,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

impl EventMetadata {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_ms: current_timestamp(),
        }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation flag and reason shared by every handler of one publish.
///
/// The only mutator is [`CancellationState::request`]. The first request wins
/// the reason; later requests keep the event cancelled and leave the reason
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationState {
    cancelled: bool,
    reason: Option<String>,
}

impl CancellationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Marks the event cancelled. Returns `true` if this call set the reason.
    pub fn request(&mut self, reason: Option<&str>) -> bool {
        self.cancelled = true;
        if self.reason.is_some() {
            return false;
        }
        self.reason = Some(reason.unwrap_or(DEFAULT_CANCEL_REASON).to_string());
        true
    }
}

/// Events that handlers may veto.
///
/// Handlers running after a cancellation still execute; each is responsible
/// for checking [`Cancellable::is_cancelled`] before acting.
pub trait Cancellable {
    fn cancellation(&self) -> &CancellationState;

    fn cancellation_mut(&mut self) -> &mut CancellationState;

    fn is_cancelled(&self) -> bool {
        self.cancellation().is_cancelled()
    }

    fn cancel_reason(&self) -> Option<&str> {
        self.cancellation().reason()
    }

    /// Requests cancellation. The first reason given sticks.
    fn request_cancel(&mut self, reason: Option<&str>) {
        self.cancellation_mut().request(reason);
    }
}
