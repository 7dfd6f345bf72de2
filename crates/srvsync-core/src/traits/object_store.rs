// # Object Store Trait
//
// Defines the interface to the remote directory service that holds the live
// SRV records.
//
// ## Implementations
//
// - In-memory: `srvsync_core::store::MemoryObjectStore` (tests, dry runs)
// - Infoblox WAPI: `srvsync-store-wapi` crate
//
// ## Usage
//
// ```rust,ignore
// use srvsync_core::ObjectStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* ObjectStore implementation */;
//
//     let obj = store.fetch_by_reference("record:srv/ZG5z...:_sip._udp.example.com/default").await?;
//     println!("{} -> {}:{}", obj.name, obj.target, obj.port);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::record::{AttributeSet, RemoteObject, ResourceKind, SrvFields};

/// Trait for remote directory implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// A store translates each call into exactly one request against the
/// directory and reports the outcome. It does not:
///
/// - retry or back off (the caller decides)
/// - cache objects between calls (every call observes live state)
/// - merge attributes or decide which object a resource maps to
///   (owned by `Reconciler`)
///
/// # Errors
///
/// - `Error::NotFound` when the addressed object does not exist
/// - `Error::Decode` when the directory returned something that is not a
///   well-formed SRV record; callers treat this as fatal
/// - `Error::Store` for transport, authentication and server failures
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object by its reference
    ///
    /// # Returns
    ///
    /// - `Ok(RemoteObject)`: The object
    /// - `Err(Error::NotFound)`: No object has this reference
    /// - `Err(Error)`: Any other failure
    async fn fetch_by_reference(&self, reference: &str) -> Result<RemoteObject, crate::Error>;

    /// Search objects of `kind` whose attribute `key` equals `value`
    ///
    /// Zero, one or many results are all valid answers.
    async fn search_by_attribute(
        &self,
        kind: ResourceKind,
        key: &str,
        value: &str,
    ) -> Result<Vec<RemoteObject>, crate::Error>;

    /// Create an object
    ///
    /// # Returns
    ///
    /// The created object, including its assigned reference
    async fn create(
        &self,
        kind: ResourceKind,
        fields: &SrvFields,
        attributes: &AttributeSet,
    ) -> Result<RemoteObject, crate::Error>;

    /// Replace an object's fields and attributes
    ///
    /// The view in `fields` is ignored; it cannot change after creation.
    ///
    /// # Returns
    ///
    /// The updated object. Its reference may differ from `reference`.
    async fn update(
        &self,
        reference: &str,
        fields: &SrvFields,
        attributes: &AttributeSet,
    ) -> Result<RemoteObject, crate::Error>;

    /// Delete an object
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Deleted
    /// - `Err(Error::NotFound)`: No object has this reference
    async fn delete(&self, reference: &str) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing object stores from configuration
pub trait ObjectStoreFactory: Send + Sync {
    /// Create an ObjectStore instance from configuration
    fn create(
        &self,
        config: &crate::config::ObjectStoreConfig,
    ) -> Result<Box<dyn ObjectStore>, crate::Error>;
}
