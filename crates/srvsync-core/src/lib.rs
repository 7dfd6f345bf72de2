// # srvsync-core
//
// Core library for reconciling declared DNS SRV records against a remote
// directory service.
//
// ## Architecture Overview
//
// - **ObjectStore**: Trait for the remote directory (fetch, search, write)
// - **ObjectLocator**: Reference-first lookup with internal-identity fallback
// - **merge**: Three-way merge of extensible attributes
// - **Reconciler**: Create/read/update/delete/import with rollback on failure
// - **StateStore**: Persistence of the previous declaration between passes
// - **StoreRegistry**: Plugin-based registry for object and state stores
//
// ## Design Principles
//
// 1. **Stable identity**: A write-once token stored on the remote object
//    survives reference churn
// 2. **Co-ownership**: Attributes written by others are never removed
// 3. **Honest state**: A failed update leaves the declaration describing
//    what is live remotely
// 4. **Library-First**: The binary is a thin shell over this crate

pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod locator;
pub mod merge;
pub mod record;
pub mod registry;
pub mod state;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{ObjectStoreConfig, ReconcilerConfig, SrvsyncConfig, StateStoreConfig};
pub use error::{Error, Result};
pub use identity::InternalId;
pub use lifecycle::{ReadOutcome, ReconcileEvent, Reconciler, UpdateTransaction};
pub use locator::ObjectLocator;
pub use record::{
    AttributeSet, DeclaredResource, LifecycleState, RemoteObject, ResourceKind, SrvFields, Ttl,
};
pub use registry::StoreRegistry;
pub use state::{FileStateStore, MemoryStateStore};
pub use store::MemoryObjectStore;
pub use traits::{ObjectStore, StateStore};
