/// Subscription management and introspection
use super::core::EventBus;
use super::stats::BusStats;
use crate::event::Event;
use std::any::TypeId;
use tracing::{debug, info, warn};

impl EventBus {
    /// Revokes and drops every subscription of every type and scope.
    ///
    /// Meant for full resets only. Frames already in flight skip the revoked
    /// entries; scopes stay active and may register again. Returns how many
    /// subscriptions were alive.
    pub fn clear_all(&self) -> usize {
        let revoked = self.registry.clear();
        warn!("🗑️ Cleared all event subscriptions ({} revoked)", revoked);
        revoked
    }

    /// Physically removes every revoked subscription now, regardless of the
    /// compaction threshold. Returns how many entries were removed.
    pub fn compact(&self) -> usize {
        let removed = self.registry.compact_all();
        self.stats.record_compaction(removed);
        if removed > 0 {
            info!("🧽 Compacted {} revoked subscriptions", removed);
        }
        removed
    }

    /// Threshold-gated compaction of one type, run before an outermost publish.
    pub(super) fn compact_type(&self, type_id: TypeId) -> usize {
        let removed = self
            .registry
            .compact_type(type_id, self.config.compaction_threshold);
        if removed > 0 {
            self.stats.record_compaction(removed);
            debug!("🧽 Compacted {} revoked subscriptions", removed);
        }
        removed
    }

    /// Live subscriptions across all event types.
    pub fn subscription_count(&self) -> usize {
        self.registry.live_count()
    }

    /// Live subscriptions for `E`, whatever their filter.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.registry.live_count_of(TypeId::of::<E>())
    }

    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.subscriber_count::<E>() > 0
    }

    /// Type keys of every event type that has been subscribed to, sorted.
    pub fn registered_event_types(&self) -> Vec<&'static str> {
        self.registry.type_keys()
    }

    /// Current nesting of `E` publishes on the call stack; 0 when idle.
    pub fn publish_depth<E: Event>(&self) -> usize {
        self.reentrancy.depth(TypeId::of::<E>())
    }

    /// Snapshot of the bus counters.
    pub fn stats(&self) -> BusStats {
        self.stats
            .snapshot(self.registry.live_count(), self.registry.type_keys().len())
    }
}
