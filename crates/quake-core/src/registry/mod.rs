//! Plugin registry
//!
//! The registry maps type names from configuration to factories for
//! every collaborator: feed connectors, coordinate lookups, map
//! renderers, notifiers and geocode stores.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quake_core::registry::PluginRegistry;
//! use quake_core::config::NotifierConfig;
//!
//! let registry = PluginRegistry::with_builtins();
//!
//! // Plugin crates register themselves
//! quake_feed_ws::register(&registry);
//!
//! let notifier = registry.create_notifier(&NotifierConfig::Log)?;
//! ```
//!
//! ## Registration
//!
//! Implementations should register themselves during initialization:
//!
//! ```rust,ignore
//! // In the quake-notify-webhook crate
//! pub fn register(registry: &PluginRegistry) {
//!     registry.register_notifier("webhook", Box::new(WebhookNotifierFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{FeedConfig, GeocodeStoreConfig, GeocoderConfig, MapConfig, NotifierConfig};
use crate::error::{Error, Result};
use crate::notify::LogNotifierFactory;
use crate::store::{FileGeocodeStoreFactory, MemoryGeocodeStoreFactory};
use crate::traits::{
    CoordinateLookup, CoordinateLookupFactory, FeedConnector, FeedConnectorFactory, GeocodeStore,
    GeocodeStoreFactory, MapRenderer, MapRendererFactory, Notifier, NotifierFactory,
};

/// Factories of one kind, keyed by type name
struct Factories<F: ?Sized> {
    kind: &'static str,
    entries: RwLock<HashMap<String, Box<F>>>,
}

impl<F: ?Sized> Factories<F> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
        }
    }

    // Registration never panics while holding a guard, so a poisoned
    // lock still holds a consistent map
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Box<F>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Box<F>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn register(&self, name: String, factory: Box<F>) {
        if self.write().insert(name.clone(), factory).is_some() {
            tracing::debug!("Replaced {} factory: {}", self.kind, name);
        }
    }

    fn create<T>(&self, name: &str, create: impl FnOnce(&F) -> Result<T>) -> Result<T> {
        let entries = self.read();
        let factory = entries
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown {} type: {}", self.kind, name)))?;
        create(factory)
    }

    fn has(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Registry for plugin-based collaborator creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
pub struct PluginRegistry {
    feeds: Factories<dyn FeedConnectorFactory>,
    lookups: Factories<dyn CoordinateLookupFactory>,
    maps: Factories<dyn MapRendererFactory>,
    notifiers: Factories<dyn NotifierFactory>,
    stores: Factories<dyn GeocodeStoreFactory>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            feeds: Factories::new("feed"),
            lookups: Factories::new("geocoder"),
            maps: Factories::new("map"),
            notifiers: Factories::new("notifier"),
            stores: Factories::new("geocode store"),
        }
    }

    /// Create a registry with the built-in `memory` and `file` stores and
    /// the `log` notifier
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryGeocodeStoreFactory));
        registry.register_store("file", Box::new(FileGeocodeStoreFactory));
        registry.register_notifier("log", Box::new(LogNotifierFactory));
        registry
    }

    /// Register a feed connector factory
    pub fn register_feed(&self, name: impl Into<String>, factory: Box<dyn FeedConnectorFactory>) {
        self.feeds.register(name.into(), factory);
    }

    /// Register a coordinate lookup factory
    pub fn register_lookup(
        &self,
        name: impl Into<String>,
        factory: Box<dyn CoordinateLookupFactory>,
    ) {
        self.lookups.register(name.into(), factory);
    }

    /// Register a map renderer factory
    pub fn register_map(&self, name: impl Into<String>, factory: Box<dyn MapRendererFactory>) {
        self.maps.register(name.into(), factory);
    }

    /// Register a notifier factory
    pub fn register_notifier(&self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        self.notifiers.register(name.into(), factory);
    }

    /// Register a geocode store factory
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn GeocodeStoreFactory>) {
        self.stores.register(name.into(), factory);
    }

    /// Create a feed connector from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn FeedConnector>)`: Created connector
    /// - `Err(Error)`: If the feed type is not registered or creation fails
    pub fn create_feed(&self, config: &FeedConfig) -> Result<Box<dyn FeedConnector>> {
        self.feeds.create(config.type_name(), |f| f.create(config))
    }

    /// Create a coordinate lookup from configuration
    ///
    /// Returns `Ok(None)` when geocoding is disabled.
    pub fn create_lookup(&self, config: &GeocoderConfig) -> Result<Option<Box<dyn CoordinateLookup>>> {
        match config.type_name() {
            None => Ok(None),
            Some(name) => self.lookups.create(name, |f| f.create(config)).map(Some),
        }
    }

    /// Create a map renderer from configuration
    ///
    /// Returns `Ok(None)` when map images are disabled.
    pub fn create_map(&self, config: &MapConfig) -> Result<Option<Box<dyn MapRenderer>>> {
        match config.type_name() {
            None => Ok(None),
            Some(name) => self.maps.create(name, |f| f.create(config)).map(Some),
        }
    }

    /// Create a notifier from configuration
    pub fn create_notifier(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        self.notifiers.create(config.type_name(), |f| f.create(config))
    }

    /// Create a geocode store from configuration
    pub fn create_store(&self, config: &GeocodeStoreConfig) -> Result<Box<dyn GeocodeStore>> {
        self.stores.create(config.type_name(), |f| f.create(config))
    }

    /// List registered feed connector types
    pub fn list_feeds(&self) -> Vec<String> {
        self.feeds.list()
    }

    /// List registered coordinate lookup types
    pub fn list_lookups(&self) -> Vec<String> {
        self.lookups.list()
    }

    /// List registered map renderer types
    pub fn list_maps(&self) -> Vec<String> {
        self.maps.list()
    }

    /// List registered notifier types
    pub fn list_notifiers(&self) -> Vec<String> {
        self.notifiers.list()
    }

    /// List registered geocode store types
    pub fn list_stores(&self) -> Vec<String> {
        self.stores.list()
    }

    /// Check if a feed connector type is registered
    pub fn has_feed(&self, name: &str) -> bool {
        self.feeds.has(name)
    }

    /// Check if a coordinate lookup type is registered
    pub fn has_lookup(&self, name: &str) -> bool {
        self.lookups.has(name)
    }

    /// Check if a map renderer type is registered
    pub fn has_map(&self, name: &str) -> bool {
        self.maps.has(name)
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        self.notifiers.has(name)
    }

    /// Check if a geocode store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.has(name)
    }
}
