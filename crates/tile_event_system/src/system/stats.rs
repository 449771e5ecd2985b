/// Statistics tracking for the event bus
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of event bus statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusStats {
    /// Publishes that reached dispatch (cyclic refusals excluded)
    pub events_published: u64,
    /// Handler invocations, faulting ones included
    pub handlers_invoked: u64,
    /// Frame entries skipped because their scope was disposed mid-dispatch
    pub handlers_skipped: u64,
    /// Handlers that returned an error or panicked
    pub handler_faults: u64,
    /// Publishes refused for exceeding the reentrancy depth limit
    pub cyclic_publish_aborts: u64,
    /// Revoked entries physically removed from the registry
    pub compacted_subscriptions: u64,
    /// Subscriptions ever registered
    pub subscriptions_created: u64,
    /// Subscriptions currently alive
    pub live_subscriptions: usize,
    /// Scopes created and not yet disposed
    pub active_scopes: usize,
    /// Event types with a registry entry
    pub registered_event_types: usize,
}

/// Lock-free counters behind [`BusStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    events_published: AtomicU64,
    handlers_invoked: AtomicU64,
    handlers_skipped: AtomicU64,
    handler_faults: AtomicU64,
    cyclic_publish_aborts: AtomicU64,
    compacted_subscriptions: AtomicU64,
    subscriptions_created: AtomicU64,
    active_scopes: AtomicUsize,
}

impl StatsCounters {
    pub(crate) fn record_publish(&self, invoked: usize, skipped: usize, faults: usize) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.handlers_invoked.fetch_add(invoked as u64, Ordering::Relaxed);
        self.handlers_skipped.fetch_add(skipped as u64, Ordering::Relaxed);
        self.handler_faults.fetch_add(faults as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_cyclic_abort(&self) {
        self.cyclic_publish_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self, removed: usize) {
        self.compacted_subscriptions.fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub(crate) fn subscription_created(&self) {
        self.subscriptions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn scope_created(&self) {
        self.active_scopes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn scope_disposed(&self) {
        let _ = self
            .active_scopes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub(crate) fn snapshot(&self, live_subscriptions: usize, registered_event_types: usize) -> BusStats {
        BusStats {
            events_published: self.events_published.load(Ordering::Relaxed),
            handlers_invoked: self.handlers_invoked.load(Ordering::Relaxed),
            handlers_skipped: self.handlers_skipped.load(Ordering::Relaxed),
            handler_faults: self.handler_faults.load(Ordering::Relaxed),
            cyclic_publish_aborts: self.cyclic_publish_aborts.load(Ordering::Relaxed),
            compacted_subscriptions: self.compacted_subscriptions.load(Ordering::Relaxed),
            subscriptions_created: self.subscriptions_created.load(Ordering::Relaxed),
            live_subscriptions,
            active_scopes: self.active_scopes.load(Ordering::Relaxed),
            registered_event_types,
        }
    }
}
