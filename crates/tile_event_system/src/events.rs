//! # Gameplay Events
//!
//! The event shapes published by the engine's gameplay systems. Producers
//! (movement, collision, tile interaction, NPC interaction) live outside this
//! crate; they build one of these records, publish it, and for cancellable
//! events branch on the cancellation flag afterwards.
//!
//! ## Event Categories
//!
//! ### Frame Events
//! - [`TickEvent`] - once per frame, global subscribers only
//!
//! ### Movement Events
//! - [`MovementStartedEvent`] - cancellable, before an entity moves
//! - [`MovementCompletedEvent`] - after the move happened
//! - [`MovementBlockedEvent`] - the producer's complement to a veto
//! - [`CollisionCheckEvent`] - cancellable, "is the target tile passable?"
//!
//! ### Tile Events
//! - [`TileSteppingOnEvent`] - cancellable pre-move validation for a tile
//! - [`TileSteppedOnEvent`] - informational, after the entity arrived
//! - [`TileSteppedOffEvent`] - informational, after the entity left
//!
//! Stepping onto a tile is two distinct types on purpose: the pre-move pass
//! may be vetoed, the post-move pass is only published for moves that
//! actually happened and cannot be cancelled.
//!
//! ### Interaction Events
//! - [`NpcInteractionEvent`] - cancellable, keyed by the NPC entity

use crate::event::{CancellationState, EventMetadata};
use crate::types::{Direction, EntityId, TilePosition};
use crate::{impl_cancellable, impl_event};
use serde::{Deserialize, Serialize};

// ============================================================================
// Frame Events
// ============================================================================

/// Published by the game loop once per frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickEvent {
    pub metadata: EventMetadata,
    /// Seconds elapsed since the previous tick
    pub delta_seconds: f32,
    /// Monotonic frame counter
    pub frame: u64,
}

impl TickEvent {
    pub fn new(delta_seconds: f32, frame: u64) -> Self {
        Self {
            metadata: EventMetadata::new(),
            delta_seconds,
            frame,
        }
    }
}

impl_event!(TickEvent, "core:tick");

// ============================================================================
// Movement Events
// ============================================================================

/// An entity is about to move one tile. Handlers may veto the move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementStartedEvent {
    pub metadata: EventMetadata,
    pub cancellation: CancellationState,
    pub entity: EntityId,
    pub from: TilePosition,
    /// Tile the entity is trying to enter; tile filters match on it
    pub to: TilePosition,
    pub direction: Direction,
}

impl MovementStartedEvent {
    pub fn new(entity: EntityId, from: TilePosition, direction: Direction) -> Self {
        Self {
            metadata: EventMetadata::new(),
            cancellation: CancellationState::new(),
            entity,
            from,
            to: from.step(direction),
            direction,
        }
    }
}

impl_event!(MovementStartedEvent, "movement:started", entity = entity, tile = to);

/// An entity finished moving one tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementCompletedEvent {
    pub metadata: EventMetadata,
    pub entity: EntityId,
    pub from: TilePosition,
    pub to: TilePosition,
    pub direction: Direction,
}

impl MovementCompletedEvent {
    pub fn new(entity: EntityId, from: TilePosition, to: TilePosition, direction: Direction) -> Self {
        Self {
            metadata: EventMetadata::new(),
            entity,
            from,
            to,
            direction,
        }
    }
}

impl_event!(MovementCompletedEvent, "movement:completed", entity = entity, tile = to);

/// A move was vetoed; published by the movement producer, not by the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementBlockedEvent {
    pub metadata: EventMetadata,
    pub entity: EntityId,
    /// Where the entity stays
    pub position: TilePosition,
    pub direction: Direction,
    pub reason: String,
}

impl MovementBlockedEvent {
    pub fn new(entity: EntityId, position: TilePosition, direction: Direction, reason: impl Into<String>) -> Self {
        Self {
            metadata: EventMetadata::new(),
            entity,
            position,
            direction,
            reason: reason.into(),
        }
    }
}

impl_event!(MovementBlockedEvent, "movement:blocked", entity = entity, tile = position);

/// Asks whether `target` is passable for `entity`. Cancelled means blocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionCheckEvent {
    pub metadata: EventMetadata,
    pub cancellation: CancellationState,
    pub entity: EntityId,
    pub target: TilePosition,
    pub direction: Direction,
}

impl CollisionCheckEvent {
    pub fn new(entity: EntityId, target: TilePosition, direction: Direction) -> Self {
        Self {
            metadata: EventMetadata::new(),
            cancellation: CancellationState::new(),
            entity,
            target,
            direction,
        }
    }
}

impl_event!(CollisionCheckEvent, "collision:check", entity = entity, tile = target);

// ============================================================================
// Tile Events
// ============================================================================

/// Pre-move validation for the tile an entity is about to step on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSteppingOnEvent {
    pub metadata: EventMetadata,
    pub cancellation: CancellationState,
    pub entity: EntityId,
    pub tile: TilePosition,
    /// Behaviour tag of the tile, e.g. `"grass"`, `"lava"`
    pub tile_type: String,
    pub direction: Direction,
}

impl TileSteppingOnEvent {
    pub fn new(entity: EntityId, tile: TilePosition, tile_type: impl Into<String>, direction: Direction) -> Self {
        Self {
            metadata: EventMetadata::new(),
            cancellation: CancellationState::new(),
            entity,
            tile,
            tile_type: tile_type.into(),
            direction,
        }
    }
}

impl_event!(TileSteppingOnEvent, "tile:stepping_on", entity = entity, tile = tile);

/// An entity arrived on a tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSteppedOnEvent {
    pub metadata: EventMetadata,
    pub entity: EntityId,
    pub tile: TilePosition,
    pub tile_type: String,
}

impl TileSteppedOnEvent {
    pub fn new(entity: EntityId, tile: TilePosition, tile_type: impl Into<String>) -> Self {
        Self {
            metadata: EventMetadata::new(),
            entity,
            tile,
            tile_type: tile_type.into(),
        }
    }
}

impl_event!(TileSteppedOnEvent, "tile:stepped_on", entity = entity, tile = tile);

/// An entity left a tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSteppedOffEvent {
    pub metadata: EventMetadata,
    pub entity: EntityId,
    pub tile: TilePosition,
    pub tile_type: String,
}

impl TileSteppedOffEvent {
    pub fn new(entity: EntityId, tile: TilePosition, tile_type: impl Into<String>) -> Self {
        Self {
            metadata: EventMetadata::new(),
            entity,
            tile,
            tile_type: tile_type.into(),
        }
    }
}

impl_event!(TileSteppedOffEvent, "tile:stepped_off", entity = entity, tile = tile);

// ============================================================================
// Interaction Events
// ============================================================================

/// A player tries to interact with an NPC. Entity filters match the NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcInteractionEvent {
    pub metadata: EventMetadata,
    pub cancellation: CancellationState,
    pub npc: EntityId,
    pub player: EntityId,
    pub npc_tile: TilePosition,
}

impl NpcInteractionEvent {
    pub fn new(npc: EntityId, player: EntityId, npc_tile: TilePosition) -> Self {
        Self {
            metadata: EventMetadata::new(),
            cancellation: CancellationState::new(),
            npc,
            player,
            npc_tile,
        }
    }
}

impl_event!(NpcInteractionEvent, "npc:interaction", entity = npc, tile = npc_tile);

impl_cancellable!(
    MovementStartedEvent,
    CollisionCheckEvent,
    TileSteppingOnEvent,
    NpcInteractionEvent,
);
