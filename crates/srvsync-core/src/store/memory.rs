// # Memory Object Store
//
// In-memory implementation of ObjectStore.
//
// ## Purpose
//
// Behaves like a small directory service: it assigns references, changes a
// record's reference when its name changes, validates SRV field ranges and
// keeps a numeric TTL even when the TTL is disabled. Useful for tests and for
// rehearsing a reconciliation without a grid.
//
// ## Out-of-band helpers
//
// `insert`, `set_attribute`, `rereference` and `remove` let tests play the
// part of other writers.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::ObjectStoreConfig;
use crate::record::{AttributeSet, RemoteObject, ResourceKind, SrvFields};
use crate::traits::{ObjectStore, ObjectStoreFactory};

const STORE_NAME: &str = "memory";

/// TTL the directory records for objects without their own TTL
const DEFAULT_ZONE_TTL: u32 = 28800;

/// In-memory directory
///
/// Clones share the same directory.
///
/// # Example
///
/// ```rust,no_run
/// use srvsync_core::store::MemoryObjectStore;
/// use srvsync_core::traits::ObjectStore;
/// use srvsync_core::record::{AttributeSet, DeclaredResource, ResourceKind};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryObjectStore::new();
///     let fields = DeclaredResource::new("_sip._udp.example.com", 10, 20, 5060, "sip.example.com")
///         .with_dns_view("default")
///         .fields();
///
///     let obj = store.create(ResourceKind::Srv, &fields, &AttributeSet::new()).await?;
///     let fetched = store.fetch_by_reference(&obj.reference).await?;
///     assert_eq!(fetched.port, 5060);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    inner: Arc<RwLock<Directory>>,
}

#[derive(Debug, Default)]
struct Directory {
    objects: BTreeMap<String, RemoteObject>,
    serial: u64,
}

impl Directory {
    fn next_reference(&mut self, kind: ResourceKind, name: &str, view: &str) -> String {
        self.serial += 1;
        format!("{}/ZG5z{:012x}:{}/{}", kind.wire_name(), self.serial, name, view)
    }
}

impl MemoryObjectStore {
    /// Create a new empty directory
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Directory::default())),
        }
    }

    /// Number of objects held
    pub async fn len(&self) -> usize {
        self.inner.read().await.objects.len()
    }

    /// Check if the directory is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.objects.is_empty()
    }

    /// Snapshot of an object, bypassing the trait
    pub async fn get(&self, reference: &str) -> Option<RemoteObject> {
        self.inner.read().await.objects.get(reference).cloned()
    }

    /// All objects, ordered by reference
    pub async fn objects(&self) -> Vec<RemoteObject> {
        self.inner.read().await.objects.values().cloned().collect()
    }

    /// Insert an object as another writer would; returns its reference
    pub async fn insert(&self, mut obj: RemoteObject) -> String {
        let mut dir = self.inner.write().await;
        if obj.reference.is_empty() {
            obj.reference = dir.next_reference(ResourceKind::Srv, &obj.name, &obj.dns_view);
        }
        let reference = obj.reference.clone();
        dir.objects.insert(reference.clone(), obj);
        reference
    }

    /// Set an attribute on an object as another writer would
    pub async fn set_attribute(
        &self,
        reference: &str,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), Error> {
        let mut dir = self.inner.write().await;
        let obj = dir
            .objects
            .get_mut(reference)
            .ok_or_else(|| Error::not_found(reference))?;
        obj.attributes.insert(key.into(), value);
        Ok(())
    }

    /// Give an object a fresh reference, as the directory does after manual edits
    pub async fn rereference(&self, reference: &str) -> Result<String, Error> {
        let mut dir = self.inner.write().await;
        let mut obj = dir
            .objects
            .remove(reference)
            .ok_or_else(|| Error::not_found(reference))?;
        obj.reference = dir.next_reference(ResourceKind::Srv, &obj.name, &obj.dns_view);
        let new_reference = obj.reference.clone();
        dir.objects.insert(new_reference.clone(), obj);
        Ok(new_reference)
    }

    /// Remove an object out of band
    pub async fn remove(&self, reference: &str) -> Option<RemoteObject> {
        self.inner.write().await.objects.remove(reference)
    }

    fn validate(fields: &SrvFields) -> Result<(), Error> {
        if fields.name.is_empty() {
            return Err(Error::store(STORE_NAME, "SRV-record name cannot be empty"));
        }
        if fields.target.is_empty() {
            return Err(Error::store(STORE_NAME, "SRV-record target cannot be empty"));
        }
        for (label, value) in [
            ("priority", fields.priority),
            ("weight", fields.weight),
            ("port", fields.port),
        ] {
            if value > u32::from(u16::MAX) {
                return Err(Error::store(
                    STORE_NAME,
                    format!("invalid {} value {}: must be in 0..65535", label, value),
                ));
            }
        }
        Ok(())
    }

    fn apply(obj: &mut RemoteObject, fields: &SrvFields, attributes: &AttributeSet) {
        obj.name = fields.name.clone();
        obj.priority = fields.priority;
        obj.weight = fields.weight;
        obj.port = fields.port;
        obj.target = fields.target.clone();
        obj.use_ttl = fields.ttl.is_set();
        obj.ttl = Some(fields.ttl.seconds().unwrap_or(DEFAULT_ZONE_TTL));
        obj.comment = fields.comment.clone();
        obj.attributes = attributes.clone();
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch_by_reference(&self, reference: &str) -> Result<RemoteObject, Error> {
        let dir = self.inner.read().await;
        dir.objects
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::not_found(reference))
    }

    async fn search_by_attribute(
        &self,
        kind: ResourceKind,
        key: &str,
        value: &str,
    ) -> Result<Vec<RemoteObject>, Error> {
        let prefix = format!("{}/", kind.wire_name());
        let dir = self.inner.read().await;
        Ok(dir
            .objects
            .values()
            .filter(|obj| obj.reference.starts_with(&prefix))
            .filter(|obj| obj.attributes.get(key).and_then(|v| v.as_str()) == Some(value))
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        kind: ResourceKind,
        fields: &SrvFields,
        attributes: &AttributeSet,
    ) -> Result<RemoteObject, Error> {
        Self::validate(fields)?;
        let mut dir = self.inner.write().await;
        let reference = dir.next_reference(kind, &fields.name, &fields.dns_view);
        let mut obj = RemoteObject {
            reference: reference.clone(),
            dns_view: fields.dns_view.clone(),
            name: String::new(),
            priority: 0,
            weight: 0,
            port: 0,
            target: String::new(),
            ttl: None,
            use_ttl: false,
            comment: String::new(),
            attributes: AttributeSet::new(),
        };
        Self::apply(&mut obj, fields, attributes);
        dir.objects.insert(reference, obj.clone());
        Ok(obj)
    }

    async fn update(
        &self,
        reference: &str,
        fields: &SrvFields,
        attributes: &AttributeSet,
    ) -> Result<RemoteObject, Error> {
        Self::validate(fields)?;
        let mut dir = self.inner.write().await;
        let mut obj = dir
            .objects
            .remove(reference)
            .ok_or_else(|| Error::not_found(reference))?;

        let renamed = obj.name != fields.name;
        Self::apply(&mut obj, fields, attributes);
        if renamed {
            obj.reference = dir.next_reference(ResourceKind::Srv, &obj.name, &obj.dns_view);
        }
        dir.objects.insert(obj.reference.clone(), obj.clone());
        Ok(obj)
    }

    async fn delete(&self, reference: &str) -> Result<(), Error> {
        let mut dir = self.inner.write().await;
        dir.objects
            .remove(reference)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(reference))
    }

    fn store_name(&self) -> &'static str {
        STORE_NAME
    }
}

/// Factory for [`MemoryObjectStore`]
pub struct MemoryObjectStoreFactory;

impl ObjectStoreFactory for MemoryObjectStoreFactory {
    fn create(&self, config: &ObjectStoreConfig) -> Result<Box<dyn ObjectStore>, Error> {
        match config {
            ObjectStoreConfig::Memory => Ok(Box::new(MemoryObjectStore::new())),
            _ => Err(Error::config("Invalid config for memory object store")),
        }
    }
}
