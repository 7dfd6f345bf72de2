//! Test doubles and common utilities for reconciliation contract tests
//!
//! `InstrumentedStore` wraps the in-memory directory, records every call
//! and can be told to fail individual operations.

#![allow(dead_code)]

use srvsync_core::error::{Error, Result};
use srvsync_core::lifecycle::{ReconcileEvent, Reconciler};
use srvsync_core::record::{AttributeSet, DeclaredResource, RemoteObject, ResourceKind, SrvFields};
use srvsync_core::store::MemoryObjectStore;
use srvsync_core::traits::ObjectStore;
use srvsync_core::ReconcilerConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const ID_KEY: &str = "Terraform Internal ID";

/// Store operations, for call accounting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Fetch,
    Search,
    Create,
    Update,
    Delete,
}

/// Failure an operation should produce
#[derive(Debug, Clone)]
pub enum Injected {
    Store(String),
    Decode(String),
    NotFound,
}

impl Injected {
    fn to_error(&self) -> Error {
        match self {
            Injected::Store(msg) => Error::store("instrumented", msg.clone()),
            Injected::Decode(msg) => Error::decode(msg.clone()),
            Injected::NotFound => Error::not_found("injected"),
        }
    }
}

/// Memory directory with call log and failure injection
///
/// Clones share the directory, the log and the injected failures.
#[derive(Clone, Default)]
pub struct InstrumentedStore {
    pub directory: MemoryObjectStore,
    calls: Arc<Mutex<Vec<Op>>>,
    failures: Arc<Mutex<HashMap<Op, Injected>>>,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail until healed
    pub fn fail(&self, op: Op, failure: Injected) {
        self.failures.lock().unwrap().insert(op, failure);
    }

    /// Stop failing `op`
    pub fn heal(&self, op: Op) {
        self.failures.lock().unwrap().remove(&op);
    }

    /// Number of times `op` was called
    pub fn count(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    /// Forget the call log
    pub fn reset_counts(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn enter(&self, op: Op) -> Result<()> {
        self.calls.lock().unwrap().push(op);
        match self.failures.lock().unwrap().get(&op) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for InstrumentedStore {
    async fn fetch_by_reference(&self, reference: &str) -> Result<RemoteObject> {
        self.enter(Op::Fetch)?;
        self.directory.fetch_by_reference(reference).await
    }

    async fn search_by_attribute(
        &self,
        kind: ResourceKind,
        key: &str,
        value: &str,
    ) -> Result<Vec<RemoteObject>> {
        self.enter(Op::Search)?;
        self.directory.search_by_attribute(kind, key, value).await
    }

    async fn create(
        &self,
        kind: ResourceKind,
        fields: &SrvFields,
        attributes: &AttributeSet,
    ) -> Result<RemoteObject> {
        self.enter(Op::Create)?;
        self.directory.create(kind, fields, attributes).await
    }

    async fn update(
        &self,
        reference: &str,
        fields: &SrvFields,
        attributes: &AttributeSet,
    ) -> Result<RemoteObject> {
        self.enter(Op::Update)?;
        self.directory.update(reference, fields, attributes).await
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        self.enter(Op::Delete)?;
        self.directory.delete(reference).await
    }

    fn store_name(&self) -> &'static str {
        "instrumented"
    }
}

/// Reconciler over `store` with default settings
pub fn reconciler(store: &InstrumentedStore) -> (Reconciler, mpsc::Receiver<ReconcileEvent>) {
    reconciler_with(store, ReconcilerConfig::default())
}

/// Reconciler over `store` with custom settings
pub fn reconciler_with(
    store: &InstrumentedStore,
    config: ReconcilerConfig,
) -> (Reconciler, mpsc::Receiver<ReconcileEvent>) {
    Reconciler::new(Box::new(store.clone()), config).expect("reconciler construction succeeds")
}

/// A typical SIP SRV declaration
pub fn sip_record() -> DeclaredResource {
    DeclaredResource::new("_sip._udp.example.com", 10, 20, 5060, "sip.example.com")
}

/// Drain all pending events
pub fn drain(rx: &mut mpsc::Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// A remote object as another writer would have created it
pub fn foreign_object(name: &str, attributes: AttributeSet) -> RemoteObject {
    RemoteObject {
        reference: String::new(),
        dns_view: "default".to_string(),
        name: name.to_string(),
        priority: 0,
        weight: 5,
        port: 443,
        target: "legacy.example.com".to_string(),
        ttl: Some(28800),
        use_ttl: false,
        comment: "hand made".to_string(),
        attributes,
    }
}
