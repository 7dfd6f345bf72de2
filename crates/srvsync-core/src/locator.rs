//! Resolving a declared resource to its remote object
//!
//! Lookup order:
//!
//! 1. By reference. Cheap, but the reference goes stale when the directory
//!    reassigns it (record renamed, recreated, edited by hand).
//! 2. By internal identity. A search for objects whose identity attribute
//!    carries our token. Survives reference churn as long as the object
//!    itself exists.
//!
//! Both missing means the object was deleted out of band. Two or more
//! identity matches is a data-integrity problem and is never resolved by
//! picking one.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identity::InternalId;
use crate::record::{RemoteObject, ResourceKind};
use crate::traits::ObjectStore;

/// Finds the one remote object a declaration refers to
pub struct ObjectLocator<'a> {
    store: &'a dyn ObjectStore,
    internal_id_key: &'a str,
}

impl<'a> ObjectLocator<'a> {
    /// Create a locator over `store`, searching identities under `internal_id_key`
    pub fn new(store: &'a dyn ObjectStore, internal_id_key: &'a str) -> Self {
        Self {
            store,
            internal_id_key,
        }
    }

    /// Locate the remote object
    ///
    /// # Returns
    ///
    /// - `Ok(Some(RemoteObject))`: Exactly one object found
    /// - `Ok(None)`: Neither the reference nor the identity resolves
    /// - `Err(Error::AmbiguousMatch)`: The identity matched several objects
    /// - `Err(Error)`: Any other store failure, propagated as-is
    pub async fn locate(
        &self,
        reference: Option<&str>,
        internal_id: Option<&InternalId>,
        kind: ResourceKind,
    ) -> Result<Option<RemoteObject>> {
        if let Some(reference) = reference.filter(|r| !r.is_empty()) {
            match self.store.fetch_by_reference(reference).await {
                Ok(obj) => {
                    debug!("Located {} by reference", reference);
                    return Ok(Some(obj));
                }
                Err(e) if e.is_not_found() => {
                    debug!(
                        "Reference {} not found, falling back to internal ID search",
                        reference
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let Some(internal_id) = internal_id else {
            debug!("No internal ID to search by; object treated as absent");
            return Ok(None);
        };

        let mut matches = self
            .store
            .search_by_attribute(kind, self.internal_id_key, internal_id.as_str())
            .await?;

        match matches.len() {
            0 => {
                debug!("No {} carries internal ID {}", kind, internal_id);
                Ok(None)
            }
            1 => {
                let obj = matches.remove(0);
                if let Some(reference) = reference {
                    warn!(
                        "Reference of {} changed out of band: {} -> {}",
                        internal_id, reference, obj.reference
                    );
                }
                Ok(Some(obj))
            }
            count => Err(Error::ambiguous_match(
                kind.wire_name(),
                self.internal_id_key,
                internal_id.as_str(),
                count,
            )),
        }
    }
}
