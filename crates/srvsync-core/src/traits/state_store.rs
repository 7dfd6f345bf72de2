// # State Store Trait
//
// Defines the interface for persisting declared resources between
// reconciliation passes.
//
// ## Purpose
//
// The stored resource is the "previous declaration" of the next pass:
// - its attributes tell the merger which keys we owned last time
// - its reference and internal identity locate the remote object
// - after a failed update it is exactly what is live remotely
//
// ## Implementations
//
// - File-based: versioned JSON file with backup
// - In-memory: tests and one-shot runs
//
// ## Usage
//
// ```rust,ignore
// use srvsync_core::StateStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* StateStore implementation */;
//
//     let previous = store.get_resource("sip").await?;
//
//     // ... reconcile ...
//
//     store.put_resource("sip", &resource).await?;
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::record::DeclaredResource;

/// Stored state of one declared resource
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StateRecord {
    /// The resource as of the last completed pass
    pub resource: DeclaredResource,
    /// Timestamp of the last write
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl StateRecord {
    /// Create a new state record stamped with the current time
    pub fn new(resource: DeclaredResource) -> Self {
        Self {
            resource,
            last_updated: chrono::Utc::now(),
        }
    }

    /// Check if the record is stale (older than given duration)
    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        let now = chrono::Utc::now();
        now.signed_duration_since(self.last_updated) > max_age
    }
}

/// Trait for state store implementations
///
/// Records are keyed by the resource address chosen by the caller.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Implementation Guidelines
///
/// - **Async I/O only**: Use async file/database operations
/// - **Durable writes**: `put_resource()` must not return before the write is
///   safe, or `flush()` must persist it
/// - **No business logic**: Stores never inspect or change resources
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the stored resource for an address
    ///
    /// # Returns
    ///
    /// - `Ok(Some(DeclaredResource))`: The stored resource
    /// - `Ok(None)`: Nothing stored
    /// - `Err(Error)`: Storage error
    async fn get_resource(&self, address: &str) -> Result<Option<DeclaredResource>, crate::Error>;

    /// Get the full state record
    async fn get_record(&self, address: &str) -> Result<Option<StateRecord>, crate::Error>;

    /// Store a resource, replacing whatever was there
    async fn put_resource(
        &self,
        address: &str,
        resource: &DeclaredResource,
    ) -> Result<(), crate::Error>;

    /// Store a full record
    async fn set_record(&self, address: &str, record: &StateRecord) -> Result<(), crate::Error>;

    /// Delete a record
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Successfully deleted (or didn't exist)
    /// - `Err(Error)`: Storage error
    async fn delete_record(&self, address: &str) -> Result<(), crate::Error>;

    /// List all addresses in the store
    async fn list_records(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing state stores from configuration
///
/// Creation is async because file-backed stores load (and possibly recover)
/// their state up front.
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StateStoreConfig,
    ) -> Result<Box<dyn StateStore>, crate::Error>;
}
