//! Reconciliation lifecycle
//!
//! The [`Reconciler`] drives one declared SRV record through its lifecycle
//! against an [`ObjectStore`]:
//!
//! ```text
//!             create               read / update
//!   Absent ───────────▶ Created ─────────────────▶ Synced ◀──▶ Updating
//!     ▲                    │                          │
//!     └────────────────────┴──────── delete ──────────┘
//!     ▲
//!     └── read finds no remote object (from any state)
//! ```
//!
//! ## Write paths
//!
//! 1. Create mints an [`InternalId`] and stamps it into the attributes
//! 2. Update re-fetches the remote object, merges attributes with
//!    [`merge::merge`], writes, and on any failure restores the previous
//!    declaration through an [`UpdateTransaction`]
//!
//! ## Read path
//!
//! Read locates the object (reference, then identity), copies its fields
//! back, and projects attributes so the identity token never reaches the
//! caller.

mod transaction;

pub use transaction::UpdateTransaction;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::identity::InternalId;
use crate::locator::ObjectLocator;
use crate::merge;
use crate::record::{AttributeSet, DeclaredResource, LifecycleState, RemoteObject};
use crate::traits::ObjectStore;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Remote object created
    Created {
        name: String,
        reference: String,
        internal_id: String,
    },

    /// Declared state refreshed from the remote object
    Synced { name: String, reference: String },

    /// Remote object is gone; local identity cleared
    Absent { name: String },

    /// Remote object updated
    Updated {
        name: String,
        previous_reference: Option<String>,
        reference: String,
    },

    /// Update failed and the declaration was restored
    RolledBack { name: String, error: String },

    /// Remote object deleted (or already gone)
    Deleted {
        name: String,
        reference: Option<String>,
    },

    /// Existing remote object adopted
    Imported { name: String, reference: String },
}

/// Result of a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The remote object exists and the declaration reflects it
    Present,
    /// The remote object is gone; the caller should recreate it
    Absent,
}

/// Reconciles declared SRV records against a remote directory
///
/// One reconciler may serve many resources, but each resource must have at
/// most one reconciliation in flight.
pub struct Reconciler {
    /// Remote directory
    store: Box<dyn ObjectStore>,

    /// Protocol settings
    config: ReconcilerConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// reconcile events
    pub fn new(
        store: Box<dyn ObjectStore>,
        config: ReconcilerConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            store,
            config,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Protocol settings in use
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    fn locator(&self) -> ObjectLocator<'_> {
        ObjectLocator::new(self.store.as_ref(), &self.config.internal_id_key)
    }

    fn resolve_view(&self, view: &str) -> String {
        if view.is_empty() {
            self.config.default_dns_view.clone()
        } else {
            view.to_string()
        }
    }

    fn reject_reserved_attribute(&self, attributes: &AttributeSet) -> Result<()> {
        if attributes.contains_key(&self.config.internal_id_key) {
            return Err(Error::validation(format!(
                "the '{}' extensible attribute is managed by srvsync and must not be set manually",
                self.config.internal_id_key
            )));
        }
        Ok(())
    }

    fn project_attributes(&self, remote: &RemoteObject) -> AttributeSet {
        merge::project(
            &remote.attributes,
            &self.config.internal_id_key,
            &self.config.hidden_attribute_keys,
        )
    }

    /// Create the remote object for a new declaration
    ///
    /// On success the resource holds the assigned reference and a fresh
    /// internal identity, and is in [`LifecycleState::Created`].
    ///
    /// # Errors
    ///
    /// - `Error::Validation`: The caller supplied an internal ID
    /// - `Error::Store`: The directory rejected the write
    pub async fn create(&self, resource: &mut DeclaredResource) -> Result<()> {
        if resource.internal_id.is_some() {
            return Err(Error::validation(
                "the value of 'internal_id' field must not be set manually",
            ));
        }
        self.reject_reserved_attribute(&resource.attributes)?;

        resource.dns_view = self.resolve_view(&resource.dns_view);

        let internal_id = InternalId::generate();
        let mut stamped = resource.attributes.clone();
        stamped.insert(
            self.config.internal_id_key.clone(),
            serde_json::Value::String(internal_id.to_string()),
        );
        let attributes = merge::merge(
            &AttributeSet::new(),
            &AttributeSet::new(),
            &stamped,
            &self.config.internal_id_key,
        );

        info!(
            "Creating SRV-record {} -> {}:{} in view {}",
            resource.name, resource.target, resource.port, resource.dns_view
        );

        let obj = self
            .store
            .create(self.config.resource_kind, &resource.fields(), &attributes)
            .await
            .map_err(|e| e.context("error creating SRV-record"))?;

        resource.reference = Some(obj.reference.clone());
        resource.internal_id = Some(internal_id.clone());
        resource.state = LifecycleState::Created;

        info!("Created {} with internal ID {}", obj.reference, internal_id);
        self.emit_event(ReconcileEvent::Created {
            name: resource.name.clone(),
            reference: obj.reference,
            internal_id: internal_id.to_string(),
        });

        Ok(())
    }

    /// Refresh a declaration from the remote object
    ///
    /// A missing remote object is not an error: the resource's identity is
    /// cleared and [`ReadOutcome::Absent`] returned so the next pass can
    /// recreate it.
    ///
    /// # Errors
    ///
    /// - `Error::AmbiguousMatch`: The identity matched several objects
    /// - `Error::Store` / `Error::Decode`: Propagated from the directory
    pub async fn read(&self, resource: &mut DeclaredResource) -> Result<ReadOutcome> {
        let located = self
            .locator()
            .locate(
                resource.reference.as_deref(),
                resource.internal_id.as_ref(),
                self.config.resource_kind,
            )
            .await?;

        let Some(obj) = located else {
            warn!(
                "SRV-record {} no longer exists remotely; clearing local identity",
                resource.name
            );
            resource.clear_identity();
            self.emit_event(ReconcileEvent::Absent {
                name: resource.name.clone(),
            });
            return Ok(ReadOutcome::Absent);
        };

        let attributes =
            merge::restrict_to_declared(self.project_attributes(&obj), &resource.attributes);
        resource.absorb_fields(&obj);
        resource.attributes = attributes;

        match (&resource.internal_id, obj.internal_id(&self.config.internal_id_key)) {
            (None, Some(remote_id)) => {
                debug!("Adopting internal ID {} from {}", remote_id, obj.reference);
                resource.internal_id = Some(remote_id);
            }
            (Some(local), Some(remote_id)) if *local != remote_id => {
                warn!(
                    "{} carries internal ID {} but the declaration holds {}",
                    obj.reference, remote_id, local
                );
            }
            _ => {}
        }

        resource.state = LifecycleState::Synced;
        self.emit_event(ReconcileEvent::Synced {
            name: resource.name.clone(),
            reference: obj.reference,
        });

        Ok(ReadOutcome::Present)
    }

    /// Push a changed declaration to the remote object
    ///
    /// `previous` is the declaration as of the last completed pass. The
    /// reference always comes from it; an identity left empty in `resource`
    /// is inherited from it.
    ///
    /// # Rollback
    ///
    /// If anything fails, `resource` is restored to `previous` before the
    /// error is returned, so persisting it records what is actually live.
    ///
    /// # Errors
    ///
    /// - `Error::Validation`: Attempt to change `internal_id` or `dns_view`
    /// - `Error::NotFound`: The remote object no longer exists
    /// - `Error::AmbiguousMatch`: The identity matched several objects
    /// - `Error::Store`: The directory rejected the write
    pub async fn update(
        &self,
        resource: &mut DeclaredResource,
        previous: &DeclaredResource,
    ) -> Result<()> {
        let txn = UpdateTransaction::begin(previous);
        resource.state = LifecycleState::Updating;

        match self.apply_update(resource, txn.snapshot()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    "Update of SRV-record {} failed, restoring previous state: {}",
                    resource.name, e
                );
                let name = resource.name.clone();
                txn.rollback(resource);
                self.emit_event(ReconcileEvent::RolledBack {
                    name,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn apply_update(
        &self,
        resource: &mut DeclaredResource,
        previous: &DeclaredResource,
    ) -> Result<()> {
        match (&resource.internal_id, &previous.internal_id) {
            (Some(new), Some(old)) if new != old => {
                return Err(Error::validation(
                    "changing the value of 'internal_id' field is not allowed",
                ));
            }
            (Some(_), None) => {
                return Err(Error::validation(
                    "the value of 'internal_id' field must not be set manually",
                ));
            }
            _ => {}
        }

        let view = self.resolve_view(&resource.dns_view);
        if view != self.resolve_view(&previous.dns_view) {
            return Err(Error::validation(
                "changing the value of 'dns_view' field is not allowed",
            ));
        }
        self.reject_reserved_attribute(&resource.attributes)?;

        if resource.reference.is_some() && resource.reference != previous.reference {
            debug!(
                "Ignoring caller-supplied reference for {}; using the last known one",
                resource.name
            );
        }
        resource.reference = previous.reference.clone();
        if resource.internal_id.is_none() {
            resource.internal_id = previous.internal_id.clone();
        }

        let remote = self
            .locator()
            .locate(
                resource.reference.as_deref(),
                resource.internal_id.as_ref(),
                self.config.resource_kind,
            )
            .await
            .map_err(|e| e.context("failed to read SRV-record for update operation"))?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "cannot find SRV-record '{}' for update operation",
                    resource.name
                ))
            })?;

        let internal_id = match resource.internal_id.clone() {
            Some(id) => id,
            None => match remote.internal_id(&self.config.internal_id_key) {
                Some(id) => {
                    debug!("Adopting internal ID {} from {}", id, remote.reference);
                    id
                }
                None => {
                    let id = InternalId::generate();
                    info!("Stamping internal ID {} on {}", id, remote.reference);
                    id
                }
            },
        };

        let mut declared_new = resource.attributes.clone();
        declared_new.insert(
            self.config.internal_id_key.clone(),
            serde_json::Value::String(internal_id.to_string()),
        );
        let attributes = merge::merge(
            &remote.attributes,
            &previous.attributes,
            &declared_new,
            &self.config.internal_id_key,
        );

        resource.dns_view = view;

        info!(
            "Updating SRV-record {} ({}) -> {}:{}",
            resource.name, remote.reference, resource.target, resource.port
        );

        let obj = self
            .store
            .update(&remote.reference, &resource.fields(), &attributes)
            .await
            .map_err(|e| e.context("error updating SRV-record"))?;

        if obj.reference != remote.reference {
            debug!("Reference changed: {} -> {}", remote.reference, obj.reference);
        }

        let previous_reference = resource.reference.replace(obj.reference.clone());
        resource.internal_id = Some(internal_id);
        resource.state = LifecycleState::Synced;

        self.emit_event(ReconcileEvent::Updated {
            name: resource.name.clone(),
            previous_reference,
            reference: obj.reference,
        });

        Ok(())
    }

    /// Delete the remote object
    ///
    /// An object that is already gone counts as deleted. On success the
    /// resource's identity is cleared.
    pub async fn delete(&self, resource: &mut DeclaredResource) -> Result<()> {
        let located = self
            .locator()
            .locate(
                resource.reference.as_deref(),
                resource.internal_id.as_ref(),
                self.config.resource_kind,
            )
            .await?;

        let reference = match located {
            Some(obj) => {
                info!("Deleting SRV-record {} ({})", resource.name, obj.reference);
                match self.store.delete(&obj.reference).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        debug!("{} vanished before delete", obj.reference);
                    }
                    Err(e) => return Err(e.context("deletion of SRV-record failed")),
                }
                Some(obj.reference)
            }
            None => {
                debug!("SRV-record {} already absent", resource.name);
                None
            }
        };

        resource.clear_identity();
        self.emit_event(ReconcileEvent::Deleted {
            name: resource.name.clone(),
            reference,
        });

        Ok(())
    }

    /// Adopt an existing remote object
    ///
    /// Fetches the object by `reference` only, builds a declaration from it,
    /// then runs an update pass so the object carries an internal identity.
    /// An identity already present on the object is kept.
    pub async fn import(&self, reference: &str) -> Result<DeclaredResource> {
        let obj = self
            .store
            .fetch_by_reference(reference)
            .await
            .map_err(|e| e.context("failed getting SRV-record"))?;

        let mut resource =
            DeclaredResource::new(obj.name.clone(), obj.priority, obj.weight, obj.port, obj.target.clone());
        resource.absorb_fields(&obj);
        resource.attributes = self.project_attributes(&obj);
        resource.internal_id = obj.internal_id(&self.config.internal_id_key);
        resource.state = LifecycleState::Synced;

        info!("Importing SRV-record {} ({})", resource.name, reference);

        let previous = resource.clone();
        self.update(&mut resource, &previous).await?;

        self.emit_event(ReconcileEvent::Imported {
            name: resource.name.clone(),
            reference: resource.reference.clone().unwrap_or_default(),
        });

        Ok(resource)
    }

    /// Emit a reconcile event
    fn emit_event(&self, event: ReconcileEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Event receiver dropped, event discarded");
            }
        }
    }
}
