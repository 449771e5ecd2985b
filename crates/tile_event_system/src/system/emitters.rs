/// Event publishing
use super::core::EventBus;
use super::reentrancy::FrameGuard;
use crate::error::{BusError, HandlerError};
use crate::event::Event;
use crate::registry::{Subscription, SubscriptionControl};
use crate::types::{ScopeId, SubscriptionId};
use crate::utils::panic_message;
use compact_str::CompactString;
use std::any::TypeId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, trace, warn};

/// A handler that failed during a publish.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerFault {
    pub subscription: SubscriptionId,
    pub scope: ScopeId,
    pub scope_name: CompactString,
    pub error: HandlerError,
}

/// What happened during one `publish` call.
///
/// Faults and aborts are reported here and in the logs; `publish` itself
/// never fails, so a broken consumer cannot destabilise the producer.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub event_type: &'static str,
    /// Depth of this publish in its same-type chain, 1 for a top-level publish
    pub depth: usize,
    pub handlers_invoked: usize,
    /// Frame entries whose scope was disposed before their turn
    pub handlers_skipped: usize,
    pub faults: Vec<HandlerFault>,
    /// Set when the publish chain was aborted as a cyclic storm
    pub aborted: Option<BusError>,
}

impl PublishOutcome {
    fn new(event_type: &'static str, depth: usize) -> Self {
        Self {
            event_type,
            depth,
            handlers_invoked: 0,
            handlers_skipped: 0,
            faults: Vec::new(),
            aborted: None,
        }
    }

    /// No faults and no abort.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty() && self.aborted.is_none()
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

impl EventBus {
    /// Publishes `event` to every matching live subscription.
    ///
    /// Builds the dispatch frame (global subscribers plus those filtered on
    /// the event's entity and tile), sorts it by priority, then invokes each
    /// handler in turn with the same `&mut event`. Returns once the last
    /// handler returns. Cancellation by a handler does not stop dispatch; the
    /// caller inspects the event afterwards.
    ///
    /// Handlers may publish, subscribe and dispose scopes while the frame is
    /// running. New subscriptions wait for the next publish; revoked ones are
    /// skipped from the moment they are revoked.
    ///
    /// # Arguments
    ///
    /// * `event` - The event instance, shared by every handler in the frame
    ///
    /// # Returns
    ///
    /// A [`PublishOutcome`] with the invoked and skipped counts and every
    /// handler fault. Faults never propagate to the caller. When same-type
    /// publishes nest past `max_publish_depth`, the whole chain is abandoned
    /// and each frame in it reports the abort in [`PublishOutcome::aborted`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tile_event_system::{create_event_bus, priority, EntityId, MovementStartedEvent};
    /// use tile_event_system::{Cancellable, Direction, HandlerError, TilePosition};
    ///
    /// let bus = create_event_bus();
    /// let scope = bus.create_scope("walls");
    /// bus.subscribe(&scope, priority::VALIDATION, |event: &mut MovementStartedEvent| {
    ///     event.request_cancel(Some("wall"));
    ///     Ok(())
    /// })?;
    /// bus.subscribe(&scope, priority::NORMAL, |_: &mut MovementStartedEvent| {
    ///     Err(HandlerError::failed("broken script"))
    /// })?;
    ///
    /// let mut event = MovementStartedEvent::new(EntityId(1), TilePosition::new(0, 0), Direction::East);
    /// let outcome = bus.publish(&mut event);
    ///
    /// assert_eq!(event.cancel_reason(), Some("wall"));
    /// assert_eq!(outcome.handlers_invoked, 2);
    /// assert_eq!(outcome.faults.len(), 1);
    /// # Ok::<(), tile_event_system::BusError>(())
    /// ```
    pub fn publish<E: Event>(&self, event: &mut E) -> PublishOutcome {
        let type_id = TypeId::of::<E>();
        let event_type = E::type_key();
        let max_depth = self.config.max_publish_depth;

        let depth = match self.reentrancy.enter(type_id, max_depth) {
            Ok(depth) => depth,
            Err(depth) => {
                self.stats.record_cyclic_abort();
                error!(
                    "🔁 Cyclic publish of '{}' exceeded depth {} - aborting the publish chain (event {})",
                    event_type,
                    max_depth,
                    event.metadata().id
                );
                let mut outcome = PublishOutcome::new(event_type, depth + 1);
                outcome.aborted = Some(BusError::CyclicPublish { event_type, max_depth });
                return outcome;
            }
        };
        let _frame = FrameGuard::new(&self.reentrancy, type_id);
        let mut outcome = PublishOutcome::new(event_type, depth);

        // Outermost frame of this type: nothing of it is in flight.
        if depth == 1 {
            self.compact_type(type_id);
        }

        let frame = match self.registry.frame_for(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!("❌ Failed to build dispatch frame for '{}': {}", event_type, e);
                outcome.aborted = Some(e);
                return outcome;
            }
        };

        if self.config.trace_dispatch {
            trace!("📤 Publishing '{}' to {} subscribers (depth {})", event_type, frame.len(), depth);
        }

        for subscription in frame.iter() {
            if self.reentrancy.is_storming(type_id) {
                warn!(
                    "🛑 Stopping '{}' dispatch at depth {} after cyclic publish",
                    event_type, depth
                );
                outcome.aborted = Some(BusError::CyclicPublish { event_type, max_depth });
                break;
            }
            if !subscription.is_alive() {
                outcome.handlers_skipped += 1;
                continue;
            }

            outcome.handlers_invoked += 1;
            if let Err(error) = self.invoke(subscription, event) {
                error!(
                    "❌ Handler {} in scope '{}' ({}) failed for '{}': {}",
                    subscription.id, subscription.scope_name, subscription.scope_id, event_type, error
                );
                outcome.faults.push(HandlerFault {
                    subscription: subscription.id,
                    scope: subscription.scope_id,
                    scope_name: subscription.scope_name.clone(),
                    error,
                });
            }
        }
        // A storm raised by our last handler still aborts this frame.
        if outcome.aborted.is_none() && self.reentrancy.is_storming(type_id) {
            outcome.aborted = Some(BusError::CyclicPublish { event_type, max_depth });
        }

        self.stats
            .record_publish(outcome.handlers_invoked, outcome.handlers_skipped, outcome.faults.len());
        outcome
    }

    /// Runs one handler behind a panic boundary.
    fn invoke<E: Event>(&self, subscription: &Subscription<E>, event: &mut E) -> Result<(), HandlerError> {
        if self.config.trace_dispatch {
            trace!(
                "▶️ {} (priority {}, scope '{}') handling '{}'",
                subscription.id,
                subscription.priority,
                subscription.scope_name,
                E::type_key()
            );
        }

        match catch_unwind(AssertUnwindSafe(|| subscription.invoke(event))) {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}
