//! Subscription scopes
//!
//! A scope is the unit of ownership for subscriptions: each script module
//! registers everything through its own scope, and disposing the scope
//! revokes exactly those subscriptions and nothing else. Scopes are never
//! shared between modules.

use crate::error::BusError;
use crate::registry::SubscriptionControl;
use crate::system::EventBus;
use crate::types::{ScopeId, SubscriptionId};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::any::TypeId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

#[derive(Default)]
struct ScopeState {
    disposed: bool,
    owned: Vec<Arc<dyn SubscriptionControl>>,
}

/// Owns a group of subscriptions on one [`EventBus`].
///
/// Active until [`dispose`](Self::dispose) is called or the scope is
/// dropped; disposed is terminal. Disposal can happen at any time,
/// including from inside a handler while a publish is in flight: the
/// revoked handlers are skipped when their turn comes.
pub struct SubscriptionScope {
    id: ScopeId,
    name: CompactString,
    bus: Weak<EventBus>,
    state: Mutex<ScopeState>,
}

impl std::fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("disposed", &self.is_disposed())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl SubscriptionScope {
    pub(crate) fn new(id: ScopeId, name: &str, bus: Weak<EventBus>) -> Self {
        Self {
            id,
            name: CompactString::new(name),
            bus,
            state: Mutex::new(ScopeState::default()),
        }
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Number of owned subscriptions that are still alive.
    ///
    /// Drops below the registered count if the bus was cleared with
    /// [`EventBus::clear_all`].
    pub fn subscription_count(&self) -> usize {
        self.lock().owned.iter().filter(|s| s.is_alive()).count()
    }

    /// Revokes every subscription this scope owns and marks it disposed.
    ///
    /// Returns how many subscriptions were revoked. Calling it again is a
    /// no-op that returns 0.
    pub fn dispose(&self) -> usize {
        let owned = {
            let mut state = self.lock();
            if state.disposed {
                return 0;
            }
            state.disposed = true;
            std::mem::take(&mut state.owned)
        };

        let mut revoked_by_type: SmallVec<[(TypeId, usize); 4]> = SmallVec::new();
        for subscription in &owned {
            if !subscription.revoke() {
                continue;
            }
            let type_id = subscription.event_type();
            match revoked_by_type.iter_mut().find(|(t, _)| *t == type_id) {
                Some((_, count)) => *count += 1,
                None => revoked_by_type.push((type_id, 1)),
            }
        }
        let revoked = revoked_by_type.iter().map(|(_, count)| count).sum();

        if let Some(bus) = self.bus.upgrade() {
            bus.on_scope_disposed(&revoked_by_type);
        }
        debug!(
            "🧹 Disposed scope '{}' ({}), revoked {} subscriptions",
            self.name, self.id, revoked
        );
        revoked
    }

    /// Whether this scope was created by `bus`.
    pub(crate) fn belongs_to(&self, bus: &EventBus) -> bool {
        std::ptr::eq(self.bus.as_ptr(), bus)
    }

    /// Registers a new subscription under this scope.
    ///
    /// `register` runs with the scope locked, so a concurrent dispose either
    /// happens entirely before (and the registration is refused) or entirely
    /// after (and revokes it).
    pub(crate) fn adopt<F>(&self, register: F) -> Result<SubscriptionId, BusError>
    where
        F: FnOnce() -> Result<Arc<dyn SubscriptionControl>, BusError>,
    {
        let mut state = self.lock();
        if state.disposed {
            return Err(BusError::ScopeDisposed {
                id: self.id,
                name: self.name.to_string(),
            });
        }
        let subscription = register()?;
        let id = subscription.id();
        state.owned.push(subscription);
        Ok(id)
    }

    fn lock(&self) -> MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.dispose();
    }
}
