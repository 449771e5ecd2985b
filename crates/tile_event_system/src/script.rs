//! Script module hosting
//!
//! A [`ScriptModule`] is the consumer side of the bus: it registers its
//! handlers once, when loaded, through a [`ScriptContext`] bound to a fresh
//! [`SubscriptionScope`]. The [`ScriptHost`] keeps one scope per loaded
//! module, so unloading or hot-reloading a module revokes exactly its own
//! handlers. Every host operation may be called from inside a handler while
//! a publish is in flight.

use crate::error::{BusError, ScriptError};
use crate::event::Event;
use crate::registry::HandlerResult;
use crate::scope::SubscriptionScope;
use crate::system::EventBus;
use crate::types::{EntityId, SubscriptionId, TilePosition};
use crate::utils::{current_timestamp, panic_message};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{error, info, warn};

/// A hot-reloadable unit of gameplay script.
pub trait ScriptModule: Send + Sync {
    /// Unique name; a reload replaces the loaded module with the same name.
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Registers this module's handlers.
    ///
    /// Runs once per load. If it fails or panics, every subscription made so
    /// far is revoked and the module is not loaded.
    fn register(&mut self, context: &ScriptContext<'_>) -> Result<(), ScriptError>;

    /// Called after the module's subscriptions were revoked on unload.
    fn on_unload(&mut self) {}
}

/// What a module sees while it registers.
pub struct ScriptContext<'a> {
    bus: &'a Arc<EventBus>,
    scope: &'a SubscriptionScope,
    generation: u64,
}

impl<'a> ScriptContext<'a> {
    pub fn bus(&self) -> &Arc<EventBus> {
        self.bus
    }

    /// Weak handle for handlers that publish. Capturing a strong `Arc` in a
    /// handler would keep the bus alive through its own registry.
    pub fn bus_handle(&self) -> Weak<EventBus> {
        Arc::downgrade(self.bus)
    }

    pub fn scope(&self) -> &SubscriptionScope {
        self.scope
    }

    /// 1 for the first load under this name, incremented on each reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscribe<E, F>(&self, priority: i32, handler: F) -> Result<SubscriptionId, BusError>
    where
        E: Event,
        F: Fn(&mut E) -> HandlerResult + Send + Sync + 'static,
    {
        self.bus.subscribe(self.scope, priority, handler)
    }

    pub fn subscribe_entity<E, F>(
        &self,
        entity: EntityId,
        priority: i32,
        handler: F,
    ) -> Result<SubscriptionId, BusError>
    where
        E: Event,
        F: Fn(&mut E) -> HandlerResult + Send + Sync + 'static,
    {
        self.bus.subscribe_entity(self.scope, entity, priority, handler)
    }

    pub fn subscribe_tile<E, F>(
        &self,
        tile: TilePosition,
        priority: i32,
        handler: F,
    ) -> Result<SubscriptionId, BusError>
    where
        E: Event,
        F: Fn(&mut E) -> HandlerResult + Send + Sync + 'static,
    {
        self.bus.subscribe_tile(self.scope, tile, priority, handler)
    }
}

/// Information about a loaded module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptInfo {
    pub name: String,
    pub version: String,
    pub generation: u64,
    pub loaded_at_ms: u64,
    /// Live subscriptions owned by the module's scope
    pub subscriptions: usize,
}

struct LoadedScript {
    module: Box<dyn ScriptModule>,
    scope: SubscriptionScope,
    generation: u64,
    loaded_at_ms: u64,
}

impl LoadedScript {
    fn info(&self, name: &str) -> ScriptInfo {
        ScriptInfo {
            name: name.to_string(),
            version: self.module.version().to_string(),
            generation: self.generation,
            loaded_at_ms: self.loaded_at_ms,
            subscriptions: self.scope.subscription_count(),
        }
    }
}

/// Loads, unloads and hot-reloads script modules against one bus.
pub struct ScriptHost {
    bus: Arc<EventBus>,
    modules: DashMap<String, LoadedScript>,
    generations: DashMap<String, u64>,
}

impl ScriptHost {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            modules: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Loads a module under a fresh scope and runs its registration.
    ///
    /// `register` runs behind a panic boundary. If it returns an error or
    /// panics, the scope is disposed before this returns, so a failed load
    /// leaves no subscriptions behind.
    ///
    /// # Arguments
    ///
    /// * `module` - The module to load; its [`ScriptModule::name`] must not
    ///   already be loaded
    ///
    /// # Returns
    ///
    /// The loaded module's [`ScriptInfo`], or:
    ///
    /// * [`ScriptError::AlreadyLoaded`] - a module with that name is loaded
    /// * [`ScriptError::RegistrationFailed`] - `register` returned an error
    /// * [`ScriptError::Panicked`] - `register` panicked
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tile_event_system::{create_event_bus, priority, ScriptContext, ScriptError};
    /// use tile_event_system::{ScriptHost, ScriptModule, TickEvent};
    ///
    /// struct Clock;
    ///
    /// impl ScriptModule for Clock {
    ///     fn name(&self) -> &str {
    ///         "clock"
    ///     }
    ///
    ///     fn register(&mut self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
    ///         context.subscribe(priority::NORMAL, |_: &mut TickEvent| Ok(()))?;
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let host = ScriptHost::new(create_event_bus());
    /// let info = host.load(Box::new(Clock))?;
    /// assert_eq!(info.generation, 1);
    /// assert_eq!(info.subscriptions, 1);
    /// assert!(host.load(Box::new(Clock)).is_err());
    /// # Ok::<(), ScriptError>(())
    /// ```
    pub fn load(&self, mut module: Box<dyn ScriptModule>) -> Result<ScriptInfo, ScriptError> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(ScriptError::AlreadyLoaded(name));
        }

        let generation = {
            let mut counter = self.generations.entry(name.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let scope = self.bus.create_scope(&name);
        let context = ScriptContext {
            bus: &self.bus,
            scope: &scope,
            generation,
        };

        let registered = match catch_unwind(AssertUnwindSafe(|| module.register(&context))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(ScriptError::Bus(e))) => Err(ScriptError::RegistrationFailed {
                module: name.clone(),
                reason: e.to_string(),
            }),
            Ok(Err(e)) => Err(e),
            Err(payload) => Err(ScriptError::Panicked {
                module: name.clone(),
                message: panic_message(payload.as_ref()),
            }),
        };
        if let Err(e) = registered {
            let revoked = scope.dispose();
            error!(
                "❌ Failed to load script '{}' (revoked {} partial subscriptions): {}",
                name, revoked, e
            );
            return Err(e);
        }

        let loaded = LoadedScript {
            module,
            scope,
            generation,
            loaded_at_ms: current_timestamp(),
        };
        let info = loaded.info(&name);
        match self.modules.entry(name.clone()) {
            Entry::Occupied(_) => {
                // Another load of the same name finished first.
                loaded.scope.dispose();
                return Err(ScriptError::AlreadyLoaded(name));
            }
            Entry::Vacant(slot) => {
                slot.insert(loaded);
            }
        }

        info!(
            "✅ Loaded script '{}' v{} (generation {}, {} subscriptions)",
            info.name, info.version, info.generation, info.subscriptions
        );
        Ok(info)
    }

    /// Disposes the module's scope, then discards the module.
    ///
    /// Returns how many subscriptions were revoked.
    pub fn unload(&self, name: &str) -> Result<usize, ScriptError> {
        let (name, mut loaded) = self
            .modules
            .remove(name)
            .ok_or_else(|| ScriptError::NotLoaded(name.to_string()))?;

        let revoked = loaded.scope.dispose();
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| loaded.module.on_unload())) {
            warn!(
                "⚠️ Script '{}' panicked in on_unload: {}",
                name,
                panic_message(payload.as_ref())
            );
        }

        info!("🛑 Unloaded script '{}' ({} subscriptions revoked)", name, revoked);
        Ok(revoked)
    }

    /// Hot reload: unloads the module with the same name, if any, then loads
    /// the replacement under a new scope and the next generation.
    ///
    /// If the replacement fails to register, the name stays unloaded; other
    /// modules are unaffected either way.
    ///
    /// Safe to call from inside a handler: the old scope's remaining entries
    /// in the running frame are skipped, and the new handlers first run on
    /// the next publish.
    ///
    /// # Arguments
    ///
    /// * `module` - The replacement; matched to the loaded module by name
    ///
    /// # Returns
    ///
    /// The replacement's [`ScriptInfo`], whose generation is one past the
    /// previous load, or the error [`ScriptHost::load`] would return.
    pub fn reload(&self, module: Box<dyn ScriptModule>) -> Result<ScriptInfo, ScriptError> {
        let name = module.name().to_string();
        info!("🔄 Reloading script '{}'", name);
        match self.unload(&name) {
            Ok(_) | Err(ScriptError::NotLoaded(_)) => {}
            Err(e) => return Err(e),
        }
        self.load(module)
    }

    /// Unloads every module. Returns how many were unloaded.
    pub fn unload_all(&self) -> usize {
        let names = self.module_names();
        names
            .iter()
            .filter(|name| self.unload(name).is_ok())
            .count()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Names of the loaded modules, sorted.
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn module_info(&self, name: &str) -> Option<ScriptInfo> {
        self.modules.get(name).map(|loaded| loaded.info(name))
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        self.unload_all();
    }
}
