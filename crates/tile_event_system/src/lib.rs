//! # Tile Event System
//!
//! A typed publish/subscribe bus for the modding layer of a tile-based game
//! engine. Gameplay systems announce state changes (movement, collision, tile
//! interaction, NPC interaction) without knowing who listens; hot-reloadable
//! script modules react to those changes, and sometimes veto them, while being
//! loaded and unloaded at runtime.
//!
//! ## Core Features
//!
//! - **Typed events**: handlers receive `&mut E` for the concrete event type
//! - **Priority ordering**: higher priority first, registration order on ties
//! - **Advisory cancellation**: a veto is sticky but never stops dispatch
//! - **Entity and tile filters**: O(1) index lookups per publish
//! - **Scoped ownership**: disposing a scope revokes exactly its subscriptions,
//!   even while a publish is in flight
//! - **Fault isolation**: a failing or panicking handler is logged and skipped
//! - **Cyclic publish guard**: runaway same-type recursion is aborted, not fatal
//!
//! ## Quick Start
//!
//! ```rust
//! use tile_event_system::*;
//!
//! let bus = create_event_bus();
//! let lava_guard = bus.create_scope("lava_guard");
//!
//! bus.subscribe_tile(
//!     &lava_guard,
//!     TilePosition::new(3, 4),
//!     priority::VALIDATION,
//!     |event: &mut TileSteppingOnEvent| {
//!         event.request_cancel(Some("lava"));
//!         Ok(())
//!     },
//! )?;
//!
//! let mut event = TileSteppingOnEvent::new(EntityId(1), TilePosition::new(3, 4), "lava", Direction::East);
//! bus.publish(&mut event);
//! assert!(event.is_cancelled());
//! assert_eq!(event.cancel_reason(), Some("lava"));
//!
//! // Unloading the script revokes its handlers.
//! lava_guard.dispose();
//! assert_eq!(bus.subscription_count(), 0);
//! # Ok::<(), BusError>(())
//! ```
//!
//! ## Threading
//!
//! [`EventBus`] is `Send + Sync` so it can be shared as `Arc<EventBus>`, but
//! dispatch is synchronous and assumes one logical thread: hosts serialise
//! every bus call onto their tick task.

pub mod config;
pub mod error;
pub mod event;
pub mod events;
pub mod filter;
pub mod macros;
pub mod registry;
pub mod scope;
pub mod script;
pub mod system;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_integration;

pub use config::BusConfig;
pub use error::{BusError, HandlerError, ScriptError};
pub use event::{Cancellable, CancellationState, Event, EventMetadata, DEFAULT_CANCEL_REASON};
pub use events::*;
pub use filter::SubscriptionFilter;
pub use registry::HandlerResult;
pub use scope::SubscriptionScope;
pub use script::{ScriptContext, ScriptHost, ScriptInfo, ScriptModule};
pub use system::{BusStats, EventBus, HandlerFault, PublishOutcome};
pub use types::{priority, Direction, EntityId, ScopeId, SubscriptionId, TilePosition};
pub use utils::{create_event_bus, current_timestamp};

/// Crate version, reported by hosts at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
