//! Subscription filters
//!
//! A filter is chosen once, at subscribe time, and decides which index of the
//! registry the subscription lands in. Dispatch never evaluates filters: it
//! looks up the index entries matching the event's own entity and tile.

use crate::event::Event;
use crate::error::BusError;
use crate::types::{EntityId, TilePosition};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which events of a type a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubscriptionFilter {
    /// Every event of the type.
    #[default]
    Global,
    /// Only events whose entity equals the given id.
    Entity(EntityId),
    /// Only events whose tile equals the given position.
    Tile(TilePosition),
}

impl SubscriptionFilter {
    pub fn kind(&self) -> &'static str {
        match self {
            SubscriptionFilter::Global => "global",
            SubscriptionFilter::Entity(_) => "entity",
            SubscriptionFilter::Tile(_) => "tile",
        }
    }

    /// Capability check against the event type's declared identity accessors.
    pub fn check_supported<E: Event>(&self) -> Result<(), BusError> {
        let supported = match self {
            SubscriptionFilter::Global => true,
            SubscriptionFilter::Entity(_) => E::CARRIES_ENTITY,
            SubscriptionFilter::Tile(_) => E::CARRIES_TILE,
        };
        if supported {
            Ok(())
        } else {
            Err(BusError::UnsupportedFilter {
                event_type: E::type_key(),
                filter: self.kind(),
            })
        }
    }

    /// Whether an event would be delivered to a subscription with this filter.
    pub fn matches<E: Event>(&self, event: &E) -> bool {
        match self {
            SubscriptionFilter::Global => true,
            SubscriptionFilter::Entity(id) => event.entity() == Some(*id),
            SubscriptionFilter::Tile(pos) => event.tile() == Some(*pos),
        }
    }
}

impl fmt::Display for SubscriptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionFilter::Global => write!(f, "global"),
            SubscriptionFilter::Entity(id) => write!(f, "{id}"),
            SubscriptionFilter::Tile(pos) => write!(f, "tile {pos}"),
        }
    }
}

impl From<EntityId> for SubscriptionFilter {
    fn from(id: EntityId) -> Self {
        SubscriptionFilter::Entity(id)
    }
}

impl From<TilePosition> for SubscriptionFilter {
    fn from(pos: TilePosition) -> Self {
        SubscriptionFilter::Tile(pos)
    }
}
