//! Macros for declaring events with minimal boilerplate

/// Implements [`Event`](crate::Event) for a struct with a `metadata` field.
///
/// Optional `entity = field` / `tile = field` arguments name the fields that
/// carry the event's identity and enable the matching subscription filters.
///
/// ```rust
/// use tile_event_system::{impl_event, EntityId, EventMetadata, TilePosition};
///
/// #[derive(Debug)]
/// struct DoorOpenedEvent {
///     metadata: EventMetadata,
///     opener: EntityId,
///     door: TilePosition,
/// }
///
/// impl_event!(DoorOpenedEvent, "world:door_opened", entity = opener, tile = door);
/// ```
#[macro_export]
macro_rules! impl_event {
    ($ty:ty, $key:expr) => {
        impl $crate::Event for $ty {
            fn type_key() -> &'static str {
                $key
            }

            fn metadata(&self) -> &$crate::EventMetadata {
                &self.metadata
            }
        }
    };
    ($ty:ty, $key:expr, entity = $entity:ident) => {
        impl $crate::Event for $ty {
            const CARRIES_ENTITY: bool = true;

            fn type_key() -> &'static str {
                $key
            }

            fn metadata(&self) -> &$crate::EventMetadata {
                &self.metadata
            }

            fn entity(&self) -> Option<$crate::EntityId> {
                Some(self.$entity)
            }
        }
    };
    ($ty:ty, $key:expr, tile = $tile:ident) => {
        impl $crate::Event for $ty {
            const CARRIES_TILE: bool = true;

            fn type_key() -> &'static str {
                $key
            }

            fn metadata(&self) -> &$crate::EventMetadata {
                &self.metadata
            }

            fn tile(&self) -> Option<$crate::TilePosition> {
                Some(self.$tile)
            }
        }
    };
    ($ty:ty, $key:expr, entity = $entity:ident, tile = $tile:ident) => {
        impl $crate::Event for $ty {
            const CARRIES_ENTITY: bool = true;
            const CARRIES_TILE: bool = true;

            fn type_key() -> &'static str {
                $key
            }

            fn metadata(&self) -> &$crate::EventMetadata {
                &self.metadata
            }

            fn entity(&self) -> Option<$crate::EntityId> {
                Some(self.$entity)
            }

            fn tile(&self) -> Option<$crate::TilePosition> {
                Some(self.$tile)
            }
        }
    };
}

/// Implements [`Cancellable`](crate::Cancellable) for a struct with a
/// `cancellation: CancellationState` field.
#[macro_export]
macro_rules! impl_cancellable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Cancellable for $ty {
                fn cancellation(&self) -> &$crate::CancellationState {
                    &self.cancellation
                }

                fn cancellation_mut(&mut self) -> &mut $crate::CancellationState {
                    &mut self.cancellation
                }
            }
        )+
    };
}
