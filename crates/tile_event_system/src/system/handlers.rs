/// Subscription registration methods
use super::core::EventBus;
use crate::error::BusError;
use crate::event::Event;
use crate::filter::SubscriptionFilter;
use crate::registry::{HandlerResult, Subscription, SubscriptionControl};
use crate::scope::SubscriptionScope;
use crate::types::{EntityId, SubscriptionId, TilePosition};
use compact_str::CompactString;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

impl EventBus {
    /// Registers a handler for every event of type `E`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tile_event_system::{create_event_bus, priority, TickEvent};
    ///
    /// let bus = create_event_bus();
    /// let scope = bus.create_scope("clock");
    /// bus.subscribe(&scope, priority::NORMAL, |tick: &mut TickEvent| {
    ///     assert!(tick.delta_seconds >= 0.0);
    ///     Ok(())
    /// })?;
    ///
    /// bus.publish(&mut TickEvent::new(0.016, 1));
    /// # Ok::<(), tile_event_system::BusError>(())
    /// ```
    pub fn subscribe<E, F>(
        &self,
        scope: &SubscriptionScope,
        priority: i32,
        handler: F,
    ) -> Result<SubscriptionId, BusError>
    where
        E: Event,
        F: Fn(&mut E) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_filtered(scope, SubscriptionFilter::Global, priority, handler)
    }

    /// Registers a handler that only receives events about `entity`.
    pub fn subscribe_entity<E, F>(
        &self,
        scope: &SubscriptionScope,
        entity: EntityId,
        priority: i32,
        handler: F,
    ) -> Result<SubscriptionId, BusError>
    where
        E: Event,
        F: Fn(&mut E) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_filtered(scope, SubscriptionFilter::Entity(entity), priority, handler)
    }

    /// Registers a handler that only receives events about `tile`.
    pub fn subscribe_tile<E, F>(
        &self,
        scope: &SubscriptionScope,
        tile: TilePosition,
        priority: i32,
        handler: F,
    ) -> Result<SubscriptionId, BusError>
    where
        E: Event,
        F: Fn(&mut E) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_filtered(scope, SubscriptionFilter::Tile(tile), priority, handler)
    }

    /// Registers a handler with an explicit filter.
    ///
    /// Fails if the scope is disposed or belongs to another bus, or if `E`
    /// does not carry the identity the filter needs. A filter target that
    /// simply never shows up is not an error; the subscription stays inert.
    pub fn subscribe_filtered<E, F>(
        &self,
        scope: &SubscriptionScope,
        filter: SubscriptionFilter,
        priority: i32,
        handler: F,
    ) -> Result<SubscriptionId, BusError>
    where
        E: Event,
        F: Fn(&mut E) -> HandlerResult + Send + Sync + 'static,
    {
        filter.check_supported::<E>()?;
        if !scope.belongs_to(self) {
            return Err(BusError::ForeignScope {
                id: scope.id(),
                name: scope.name().to_string(),
            });
        }

        scope.adopt(|| {
            let id = SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::Relaxed));
            let subscription = Arc::new(Subscription::new(
                id,
                priority,
                filter,
                scope.id(),
                CompactString::new(scope.name()),
                Box::new(handler),
            ));
            self.registry.insert(subscription.clone())?;
            self.stats.subscription_created();

            debug!(
                "📝 Registered {} for '{}' ({}, priority {}) in scope '{}'",
                id,
                E::type_key(),
                filter,
                priority,
                scope.name()
            );
            Ok(subscription as Arc<dyn SubscriptionControl>)
        })
    }
}
