/// Core EventBus implementation
use super::reentrancy::ReentrancyTracker;
use super::stats::StatsCounters;
use crate::config::BusConfig;
use crate::error::BusError;
use crate::registry::Registry;
use crate::scope::SubscriptionScope;
use crate::types::ScopeId;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The dispatch engine: routes published events to subscribed handlers.
///
/// Subscriptions are stored per concrete event type and indexed by filter
/// (global, entity, tile). Every `publish` takes an ordered snapshot of the
/// matching live subscriptions and invokes them synchronously, in priority
/// order, with one shared `&mut` event. Handlers may subscribe, dispose
/// scopes or publish again while they run; none of that disturbs the frame
/// currently being dispatched.
///
/// The bus is `Send + Sync` so it can be shared as `Arc<EventBus>` and
/// captured by handlers, but dispatch assumes a single logical thread:
/// hosts must serialise all bus calls onto one thread or tick task.
pub struct EventBus {
    /// Subscriptions by event type
    pub(super) registry: Registry,
    /// Limits and toggles fixed at construction
    pub(super) config: BusConfig,
    /// Monotonic counters for monitoring
    pub(super) stats: StatsCounters,
    /// Per-type publish depth for cyclic-storm detection
    pub(super) reentrancy: ReentrancyTracker,
    pub(super) next_subscription_id: AtomicU64,
    pub(super) next_scope_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("event_types", &self.registry.type_keys())
            .field("live_subscriptions", &self.registry.live_count())
            .finish()
    }
}

impl EventBus {
    /// Creates an event bus with the default configuration.
    pub fn new() -> Self {
        Self::build(BusConfig::default())
    }

    /// Creates an event bus with a custom configuration.
    pub fn with_config(config: BusConfig) -> Result<Self, BusError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: BusConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
            stats: StatsCounters::default(),
            reentrancy: ReentrancyTracker::new(),
            next_subscription_id: AtomicU64::new(1),
            next_scope_id: AtomicU64::new(1),
        }
    }

    #[inline]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Creates a fresh, active scope owned by the caller.
    ///
    /// Every subscription registered through the scope is revoked when the
    /// scope is disposed or dropped. The scope only holds a weak handle to
    /// the bus, so it never keeps a dropped bus alive.
    ///
    /// # Arguments
    ///
    /// * `name` - Label used in logs and in [`HandlerFault::scope_name`](crate::HandlerFault)
    ///
    /// # Returns
    ///
    /// A fresh, active [`SubscriptionScope`] with its own [`ScopeId`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tile_event_system::{create_event_bus, priority, TickEvent};
    ///
    /// let bus = create_event_bus();
    /// let scope = bus.create_scope("weather");
    /// bus.subscribe(&scope, priority::COSMETIC, |_: &mut TickEvent| Ok(()))?;
    /// assert_eq!(scope.subscription_count(), 1);
    ///
    /// drop(scope);
    /// assert_eq!(bus.subscription_count(), 0);
    /// # Ok::<(), tile_event_system::BusError>(())
    /// ```
    pub fn create_scope(self: &Arc<Self>, name: &str) -> SubscriptionScope {
        let id = ScopeId(self.next_scope_id.fetch_add(1, Ordering::Relaxed));
        self.stats.scope_created();
        debug!("📦 Created scope '{}' ({})", name, id);
        SubscriptionScope::new(id, name, Arc::downgrade(self))
    }

    /// Bookkeeping after a scope revoked its subscriptions.
    pub(crate) fn on_scope_disposed(&self, revoked_by_type: &[(TypeId, usize)]) {
        for (type_id, count) in revoked_by_type {
            self.registry.note_revoked(*type_id, *count);
        }
        self.stats.scope_disposed();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
