//! Subscriber registry
//!
//! One [`TypeSubscribers`] per concrete event type, stored behind a
//! `TypeId`-keyed [`DashMap`]. Each holds three indices: the global list, an
//! entity→list map and a tile→list map. A subscription lives in exactly one of
//! them, chosen by its filter when it is registered.
//!
//! Storage is append-only. Revoking a subscription flips its `alive` flag;
//! the entry is physically dropped only by [`Registry::compact_type`] or
//! [`Registry::compact_all`], which the bus calls at safe points.

use crate::error::{BusError, HandlerError};
use crate::event::Event;
use crate::filter::SubscriptionFilter;
use crate::types::{EntityId, ScopeId, SubscriptionId, TilePosition};
use compact_str::CompactString;
use dashmap::DashMap;
use smallvec::SmallVec;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result type returned by every handler.
pub type HandlerResult = Result<(), HandlerError>;

pub(crate) type BoxedHandler<E> = Box<dyn Fn(&mut E) -> HandlerResult + Send + Sync>;

/// A registered handler together with its ordering and ownership data.
pub(crate) struct Subscription<E: Event> {
    pub(crate) id: SubscriptionId,
    pub(crate) priority: i32,
    pub(crate) filter: SubscriptionFilter,
    pub(crate) scope_id: ScopeId,
    pub(crate) scope_name: CompactString,
    alive: AtomicBool,
    handler: BoxedHandler<E>,
}

impl<E: Event> Subscription<E> {
    pub(crate) fn new(
        id: SubscriptionId,
        priority: i32,
        filter: SubscriptionFilter,
        scope_id: ScopeId,
        scope_name: CompactString,
        handler: BoxedHandler<E>,
    ) -> Self {
        Self {
            id,
            priority,
            filter,
            scope_id,
            scope_name,
            alive: AtomicBool::new(true),
            handler,
        }
    }

    pub(crate) fn invoke(&self, event: &mut E) -> HandlerResult {
        (self.handler)(event)
    }
}

/// Type-erased control surface a scope keeps for each subscription it owns.
pub(crate) trait SubscriptionControl: Send + Sync {
    fn id(&self) -> SubscriptionId;

    fn event_type(&self) -> TypeId;

    fn is_alive(&self) -> bool;

    /// Clears the alive flag. Returns `true` if this call revoked it.
    fn revoke(&self) -> bool;
}

impl<E: Event> SubscriptionControl for Subscription<E> {
    fn id(&self) -> SubscriptionId {
        self.id
    }

    fn event_type(&self) -> TypeId {
        TypeId::of::<E>()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn revoke(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }
}

/// Ordered snapshot of the subscriptions one publish will visit.
pub(crate) struct DispatchFrame<E: Event> {
    entries: SmallVec<[Arc<Subscription<E>>; 8]>,
}

impl<E: Event> DispatchFrame<E> {
    pub(crate) fn empty() -> Self {
        Self { entries: SmallVec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Subscription<E>>> {
        self.entries.iter()
    }
}

/// Subscriptions of one event type, indexed by filter.
pub(crate) struct TypeSubscribers<E: Event> {
    global: Vec<Arc<Subscription<E>>>,
    by_entity: HashMap<EntityId, Vec<Arc<Subscription<E>>>>,
    by_tile: HashMap<TilePosition, Vec<Arc<Subscription<E>>>>,
    revoked: usize,
}

impl<E: Event> TypeSubscribers<E> {
    pub(crate) fn new() -> Self {
        Self {
            global: Vec::new(),
            by_entity: HashMap::new(),
            by_tile: HashMap::new(),
            revoked: 0,
        }
    }

    pub(crate) fn insert(&mut self, subscription: Arc<Subscription<E>>) {
        match subscription.filter {
            SubscriptionFilter::Global => self.global.push(subscription),
            SubscriptionFilter::Entity(id) => self.by_entity.entry(id).or_default().push(subscription),
            SubscriptionFilter::Tile(pos) => self.by_tile.entry(pos).or_default().push(subscription),
        }
    }

    /// Builds the dispatch frame for `event`: global ∪ entity list ∪ tile
    /// list, live entries only, priority descending, registration order on ties.
    pub(crate) fn frame_for(&self, event: &E) -> DispatchFrame<E> {
        let mut entries: SmallVec<[Arc<Subscription<E>>; 8]> = SmallVec::new();
        let entity_list = event.entity().and_then(|id| self.by_entity.get(&id));
        let tile_list = event.tile().and_then(|pos| self.by_tile.get(&pos));

        let candidates = self
            .global
            .iter()
            .chain(entity_list.into_iter().flatten())
            .chain(tile_list.into_iter().flatten());
        for subscription in candidates {
            if subscription.is_alive() {
                entries.push(subscription.clone());
            }
        }

        entries.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        DispatchFrame { entries }
    }

    fn lists(&self) -> impl Iterator<Item = &Vec<Arc<Subscription<E>>>> {
        std::iter::once(&self.global)
            .chain(self.by_entity.values())
            .chain(self.by_tile.values())
    }
}

/// Object-safe view of a [`TypeSubscribers`] stored in the registry map.
pub(crate) trait ErasedSubscribers: Send + Sync {
    fn type_key(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn note_revoked(&mut self, count: usize);

    fn revoked(&self) -> usize;

    /// Drops revoked entries. Returns how many were removed.
    fn compact(&mut self) -> usize;

    /// Revokes every subscription. Returns how many were still alive.
    fn revoke_all(&mut self) -> usize;

    fn live_count(&self) -> usize;
}

impl<E: Event> ErasedSubscribers for TypeSubscribers<E> {
    fn type_key(&self) -> &'static str {
        E::type_key()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn note_revoked(&mut self, count: usize) {
        self.revoked += count;
    }

    fn revoked(&self) -> usize {
        self.revoked
    }

    fn compact(&mut self) -> usize {
        let before: usize = self.lists().map(Vec::len).sum();

        self.global.retain(|s| s.is_alive());
        self.by_entity.retain(|_, list| {
            list.retain(|s| s.is_alive());
            !list.is_empty()
        });
        self.by_tile.retain(|_, list| {
            list.retain(|s| s.is_alive());
            !list.is_empty()
        });
        self.revoked = 0;

        let after: usize = self.lists().map(Vec::len).sum();
        before - after
    }

    fn revoke_all(&mut self) -> usize {
        let mut revoked = 0;
        for list in self.lists() {
            for subscription in list {
                if subscription.revoke() {
                    revoked += 1;
                }
            }
        }
        self.revoked += revoked;
        revoked
    }

    fn live_count(&self) -> usize {
        self.lists().flatten().filter(|s| s.is_alive()).count()
    }
}

/// All subscriptions known to one bus, keyed by event type.
#[derive(Default)]
pub(crate) struct Registry {
    types: DashMap<TypeId, Box<dyn ErasedSubscribers>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert<E: Event>(&self, subscription: Arc<Subscription<E>>) -> Result<(), BusError> {
        let mut entry = self
            .types
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(TypeSubscribers::<E>::new()));
        let typed = entry
            .as_any_mut()
            .downcast_mut::<TypeSubscribers<E>>()
            .ok_or(BusError::RegistryCorrupted(E::type_key()))?;
        typed.insert(subscription);
        Ok(())
    }

    /// Snapshot of the subscribers `event` should reach. The map guard is
    /// released before this returns, so handlers may freely mutate the registry.
    pub(crate) fn frame_for<E: Event>(&self, event: &E) -> Result<DispatchFrame<E>, BusError> {
        let Some(entry) = self.types.get(&TypeId::of::<E>()) else {
            return Ok(DispatchFrame::empty());
        };
        let typed = entry
            .as_any()
            .downcast_ref::<TypeSubscribers<E>>()
            .ok_or(BusError::RegistryCorrupted(E::type_key()))?;
        Ok(typed.frame_for(event))
    }

    pub(crate) fn note_revoked(&self, type_id: TypeId, count: usize) {
        if let Some(mut entry) = self.types.get_mut(&type_id) {
            entry.note_revoked(count);
        }
    }

    /// Compacts one type if at least `threshold` entries were revoked since
    /// the last compaction.
    pub(crate) fn compact_type(&self, type_id: TypeId, threshold: usize) -> usize {
        match self.types.get_mut(&type_id) {
            Some(mut entry) if entry.revoked() >= threshold => entry.compact(),
            _ => 0,
        }
    }

    pub(crate) fn compact_all(&self) -> usize {
        self.types.iter_mut().map(|mut entry| entry.compact()).sum()
    }

    /// Revokes and drops every subscription. Returns how many were alive.
    pub(crate) fn clear(&self) -> usize {
        let revoked = self.types.iter_mut().map(|mut entry| entry.revoke_all()).sum();
        self.types.clear();
        revoked
    }

    pub(crate) fn live_count(&self) -> usize {
        self.types.iter().map(|entry| entry.live_count()).sum()
    }

    pub(crate) fn live_count_of(&self, type_id: TypeId) -> usize {
        self.types.get(&type_id).map(|entry| entry.live_count()).unwrap_or(0)
    }

    pub(crate) fn type_keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.types.iter().map(|entry| entry.type_key()).collect();
        keys.sort_unstable();
        keys
    }
}
