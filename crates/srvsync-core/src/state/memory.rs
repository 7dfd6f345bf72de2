// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Holds declarations for the lifetime of the process. Suited to tests and
// to embedding, where the caller keeps its own durable copy of the
// declarations.
//
// ## Crash Behavior
//
// - All state is lost on restart
// - The next pass has no previous declaration, so attributes removed from
//   the declaration in the meantime are no longer known to be ours and stay
//   on the remote object as foreign keys

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::record::DeclaredResource;
use crate::traits::state_store::{StateRecord, StateStore, StateStoreFactory};

/// In-memory state store implementation
///
/// # Example
///
/// ```rust,no_run
/// use srvsync_core::record::DeclaredResource;
/// use srvsync_core::state::MemoryStateStore;
/// use srvsync_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     let resource = DeclaredResource::new("_sip._udp.example.com", 10, 20, 5060, "sip.example.com");
///
///     store.put_resource("sip", &resource).await?;
///     assert_eq!(store.get_resource("sip").await?, Some(resource));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, StateRecord>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Clear all records from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_resource(&self, address: &str) -> Result<Option<DeclaredResource>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(address).map(|record| record.resource.clone()))
    }

    async fn get_record(&self, address: &str) -> Result<Option<StateRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(address).cloned())
    }

    async fn put_resource(&self, address: &str, resource: &DeclaredResource) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(address.to_string(), StateRecord::new(resource.clone()));
        Ok(())
    }

    async fn set_record(&self, address: &str, record: &StateRecord) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(address.to_string(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, address: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(address);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        let mut addresses: Vec<String> = guard.keys().cloned().collect();
        addresses.sort();
        Ok(addresses)
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory for [`MemoryStateStore`]
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::Memory => Ok(Box::new(MemoryStateStore::new())),
            _ => Err(Error::config("Invalid config for memory state store")),
        }
    }
}
