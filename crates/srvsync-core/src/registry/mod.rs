//! Plugin-based store registry
//!
//! The registry maps store type names to factories so object stores and
//! state stores are chosen from configuration, not from hardcoded match
//! arms in the binary.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use srvsync_core::registry::StoreRegistry;
//!
//! // Memory object store plus file and memory state stores
//! let registry = StoreRegistry::with_builtin();
//!
//! // Network-backed stores register themselves
//! srvsync_store_wapi::register(&registry);
//!
//! let store = registry.create_object_store(&config.object_store)?;
//! let state = registry.create_state_store(&config.state_store).await?;
//! ```

use crate::config::{ObjectStoreConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::state::{FileStateStoreFactory, MemoryStateStoreFactory};
use crate::store::MemoryObjectStoreFactory;
use crate::traits::{ObjectStore, ObjectStoreFactory, StateStore, StateStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Store registry for plugin-based store creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct StoreRegistry {
    /// Registered object store factories
    object_stores: RwLock<HashMap<String, Box<dyn ObjectStoreFactory>>>,

    /// Registered state store factories
    state_stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the stores bundled in this crate
    ///
    /// Registers the `memory` object store and the `memory` and `file`
    /// state stores.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_object_store("memory", Box::new(MemoryObjectStoreFactory));
        registry.register_state_store("memory", Box::new(MemoryStateStoreFactory));
        registry.register_state_store("file", Box::new(FileStateStoreFactory));
        registry
    }

    /// Register an object store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "wapi", "memory")
    /// - `factory`: Factory object for creating store instances
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_object_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ObjectStoreFactory>,
    ) {
        let mut stores = self
            .object_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), factory);
    }

    /// Register a state store factory
    ///
    /// # Parameters
    ///
    /// - `name`: State store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating state store instances
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) {
        let mut stores = self
            .state_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create an object store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ObjectStore>)`: Created store instance
    /// - `Err(Error::Config)`: Store type not registered, or invalid config
    pub fn create_object_store(&self, config: &ObjectStoreConfig) -> Result<Box<dyn ObjectStore>> {
        config.validate()?;
        let store_type = config.type_name();
        let stores = self
            .object_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown object store type: {}", store_type)))?;

        factory.create(config)
    }

    /// Create a state store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn StateStore>)`: Created state store instance
    /// - `Err(Error)`: Store type not registered, or creation fails
    pub async fn create_state_store(
        &self,
        config: &StateStoreConfig,
    ) -> Result<Box<dyn StateStore>> {
        config.validate()?;
        let store_type = config.type_name();

        let factory = {
            let stores = self
                .state_stores
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .ok_or_else(|| {
                    Error::config(format!("Unknown state store type: {}", store_type))
                })?
                .clone()
        };

        // Lock released before awaiting the factory
        factory.create(config).await
    }

    /// List all registered object store types
    pub fn list_object_stores(&self) -> Vec<String> {
        let stores = self
            .object_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        let stores = self
            .state_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if an object store type is registered
    pub fn has_object_store(&self, name: &str) -> bool {
        self.object_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        self.state_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
