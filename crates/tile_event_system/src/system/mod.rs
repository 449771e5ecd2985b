//! Event bus implementation
//!
//! The [`EventBus`] is split across files by concern: construction and scope
//! creation in `core`, subscription in `handlers`, dispatch in `emitters`,
//! introspection and cleanup in `management`.

mod core;
mod emitters;
mod handlers;
mod management;
mod reentrancy;
mod stats;


pub use self::core::EventBus;
pub use emitters::{HandlerFault, PublishOutcome};
pub use stats::BusStats;
