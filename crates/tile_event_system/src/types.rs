//! # Core Type Definitions
//!
//! Identity and coordinate types shared by every event, plus the identifiers
//! the bus hands out for subscriptions and scopes.
//!
//! ## Key Types
//!
//! - [`EntityId`] - Identifier of a world entity (player, NPC, object)
//! - [`TilePosition`] - Integer tile coordinate on the current map
//! - [`Direction`] - Cardinal facing/movement direction
//! - [`SubscriptionId`] / [`ScopeId`] - Bus-issued identifiers
//!
//! Wrapper types keep entity ids, subscription ids and scope ids from being
//! confused with one another.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an entity in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// A tile coordinate. Filters compare positions by exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePosition {
    pub x: i32,
    pub y: i32,
}

impl TilePosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the neighbouring tile one step in `direction`.
    ///
    /// Coordinates wrap at the `i32` bounds; use [`TilePosition::checked_step`]
    /// to detect stepping off the coordinate space instead.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x.wrapping_add(dx), self.y.wrapping_add(dy))
    }

    /// Like [`TilePosition::step`], but `None` when the neighbour would fall
    /// outside the `i32` coordinate range.
    pub fn checked_step(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.offset();
        Some(Self::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }
}

impl From<(i32, i32)> for TilePosition {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for TilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal direction on the tile grid. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::North, Direction::East, Direction::South, Direction::West];

    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

/// Identifier of a single subscription.
///
/// Ids are issued from a monotonic counter, so comparing two ids compares
/// their registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Identifier of a subscription scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Conventional priority bands. Higher priorities run first.
///
/// These are documentation, not enforcement: any `i32` is a valid priority.
pub mod priority {
    /// Validation and veto handlers that may cancel the event.
    pub const VALIDATION: i32 = 1000;
    /// Ordinary gameplay logic. The default.
    pub const NORMAL: i32 = 500;
    /// Cosmetic reactions and post-processing.
    pub const COSMETIC: i32 = 0;
    /// Analytics and logging; sees the final state of the event.
    pub const ANALYTICS: i32 = -1000;

    pub const DEFAULT: i32 = NORMAL;
}
