//! Plugin-based component registry
//!
//! The registry lets activity sources, state stores and notifiers be
//! registered at startup and created from configuration, avoiding hardcoded
//! if-else chains in the daemon.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use presence_core::registry::ComponentRegistry;
//!
//! let registry = ComponentRegistry::with_builtins();
//! presence_source_pihole::register(&registry);
//!
//! let source = registry.create_activity_source(&config.activity_source)?;
//! let store = registry.create_state_store(&config.state_store).await?;
//! let notifier = registry.create_notifier(&config.notifier)?;
//! ```
//!
//! ## Registration
//!
//! Implementation crates expose a `register()` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ComponentRegistry) {
//!     registry.register_activity_source("pihole", Box::new(PiholeActivitySourceFactory));
//! }
//! ```

use crate::config::{ActivitySourceConfig, NotifierConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::notify::LogNotifierFactory;
use crate::state::{FileStateStoreFactory, MemoryStateStoreFactory};
use crate::traits::{ActivitySource, Notifier, PresenceStore};
use crate::traits::{ActivitySourceFactory, NotifierFactory, StateStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry of component factories keyed by configuration type name
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    activity_sources: RwLock<HashMap<String, Box<dyn ActivitySourceFactory>>>,
    state_stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
    notifiers: RwLock<HashMap<String, Box<dyn NotifierFactory>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the components shipped in this crate
    ///
    /// Registers the `file` and `memory` state stores and the `log` notifier.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_state_store("file", Box::new(FileStateStoreFactory));
        registry.register_state_store("memory", Box::new(MemoryStateStoreFactory));
        registry.register_notifier("log", Box::new(LogNotifierFactory));
        registry
    }

    /// Register an activity source factory
    pub fn register_activity_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ActivitySourceFactory>,
    ) {
        write(&self.activity_sources).insert(name.into(), factory);
    }

    /// Register a state store factory
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) {
        write(&self.state_stores).insert(name.into(), Arc::from(factory));
    }

    /// Register a notifier factory
    pub fn register_notifier(&self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        write(&self.notifiers).insert(name.into(), factory);
    }

    /// Create an activity source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ActivitySource>)`: Created source
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_activity_source(
        &self,
        config: &ActivitySourceConfig,
    ) -> Result<Box<dyn ActivitySource>> {
        let source_type = config.type_name();
        let sources = read(&self.activity_sources);

        let factory = sources.get(source_type).ok_or_else(|| {
            Error::config(format!("Unknown activity source type: {}", source_type))
        })?;

        factory.create(config)
    }

    /// Create a state store from configuration
    pub async fn create_state_store(
        &self,
        config: &StateStoreConfig,
    ) -> Result<Box<dyn PresenceStore>> {
        let store_type = config.type_name();

        // Release the lock before awaiting the factory
        let factory = read(&self.state_stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// Create a notifier from configuration
    pub fn create_notifier(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        let notifier_type = config.type_name();
        let notifiers = read(&self.notifiers);

        let factory = notifiers
            .get(notifier_type)
            .ok_or_else(|| Error::config(format!("Unknown notifier type: {}", notifier_type)))?;

        factory.create(config)
    }

    /// List all registered activity source types
    pub fn list_activity_sources(&self) -> Vec<String> {
        read(&self.activity_sources).keys().cloned().collect()
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        read(&self.state_stores).keys().cloned().collect()
    }

    /// List all registered notifier types
    pub fn list_notifiers(&self) -> Vec<String> {
        read(&self.notifiers).keys().cloned().collect()
    }

    /// Check if an activity source type is registered
    pub fn has_activity_source(&self, name: &str) -> bool {
        read(&self.activity_sources).contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        read(&self.state_stores).contains_key(name)
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        read(&self.notifiers).contains_key(name)
    }
}

// A poisoned lock only means a registration panicked; the map itself is intact.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
