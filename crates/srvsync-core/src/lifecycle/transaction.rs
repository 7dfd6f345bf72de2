//! Explicit rollback for updates
//!
//! An update mutates the declaration in place. If the remote write does not
//! happen, the declaration must go back to what is live remotely, which is
//! the previous declaration. The snapshot is taken before anything changes
//! and restored only on the failure branch.

use crate::record::DeclaredResource;

/// Snapshot of the last known good declaration
#[derive(Debug, Clone)]
pub struct UpdateTransaction {
    snapshot: DeclaredResource,
}

impl UpdateTransaction {
    /// Start a transaction whose rollback target is `previous`
    pub fn begin(previous: &DeclaredResource) -> Self {
        Self {
            snapshot: previous.clone(),
        }
    }

    /// The declaration that rollback restores
    pub fn snapshot(&self) -> &DeclaredResource {
        &self.snapshot
    }

    /// Restore every field of `resource` from the snapshot
    pub fn rollback(self, resource: &mut DeclaredResource) {
        *resource = self.snapshot;
    }
}
