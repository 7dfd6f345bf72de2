//! Contract Test: Update Rollback
//!
//! Constraints verified:
//! - A failed update leaves the declaration equal to the previous one
//! - This holds for write failures, lookup failures and validation failures
//! - A rollback is reported as an event
//! - The remote object is untouched by a failed update

mod common;

use common::*;
use serde_json::json;
use srvsync_core::{DeclaredResource, Error, LifecycleState, ReconcileEvent, Ttl};

async fn created(
    store: &InstrumentedStore,
    reconciler: &srvsync_core::Reconciler,
) -> DeclaredResource {
    let mut resource = sip_record().with_attribute("Site", json!("ams1"));
    reconciler.create(&mut resource).await.unwrap();
    store.reset_counts();
    resource
}

fn changed(previous: &DeclaredResource) -> DeclaredResource {
    let mut resource = previous.clone();
    resource.priority = 1;
    resource.port = 5080;
    resource.ttl = Ttl::Seconds(300);
    resource.attributes.insert("Site".to_string(), json!("fra1"));
    resource
}

#[tokio::test]
async fn write_failure_restores_previous() {
    let store = InstrumentedStore::new();
    let (reconciler, mut events) = reconciler(&store);
    let previous = created(&store, &reconciler).await;
    drain(&mut events);

    store.fail(Op::Update, Injected::Store("grid is read-only".to_string()));

    let mut resource = changed(&previous);
    let err = reconciler.update(&mut resource, &previous).await.unwrap_err();

    assert!(matches!(err, Error::Store { .. }));
    assert!(err.to_string().contains("error updating SRV-record"));
    assert!(err.to_string().contains("grid is read-only"));
    assert_eq!(resource, previous);
    assert_eq!(resource.state, LifecycleState::Created);

    let events = drain(&mut events);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ReconcileEvent::RolledBack { name, .. } if name == "_sip._udp.example.com"));

    let obj = store
        .directory
        .get(previous.reference.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(obj.port, 5060);
    assert_eq!(obj.attributes.get("Site"), Some(&json!("ams1")));
}

#[tokio::test]
async fn lookup_failure_restores_previous() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);
    let previous = created(&store, &reconciler).await;

    store.fail(Op::Fetch, Injected::Store("timeout".to_string()));

    let mut resource = changed(&previous);
    let err = reconciler.update(&mut resource, &previous).await.unwrap_err();

    assert!(matches!(err, Error::Store { .. }));
    assert_eq!(resource, previous);
    assert_eq!(store.count(Op::Update), 0);
}

#[tokio::test]
async fn vanished_object_fails_update_and_restores_previous() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);
    let previous = created(&store, &reconciler).await;

    store
        .directory
        .remove(previous.reference.as_deref().unwrap())
        .await
        .unwrap();

    let mut resource = changed(&previous);
    let err = reconciler.update(&mut resource, &previous).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(resource, previous);
    assert_eq!(store.count(Op::Update), 0);
}

#[tokio::test]
async fn view_change_restores_previous() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);
    let previous = created(&store, &reconciler).await;

    let mut resource = changed(&previous).with_dns_view("internal");
    let err = reconciler.update(&mut resource, &previous).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(resource, previous);
    assert_eq!(store.count(Op::Fetch), 0);
}

#[tokio::test]
async fn reserved_attribute_restores_previous() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);
    let previous = created(&store, &reconciler).await;

    let mut resource = changed(&previous).with_attribute(ID_KEY, json!("mine"));
    let err = reconciler.update(&mut resource, &previous).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(resource, previous);
}

#[tokio::test]
async fn retry_after_healing_succeeds() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);
    let previous = created(&store, &reconciler).await;

    store.fail(Op::Update, Injected::Store("busy".to_string()));
    let mut resource = changed(&previous);
    reconciler.update(&mut resource, &previous).await.unwrap_err();

    store.heal(Op::Update);
    let mut resource = changed(&previous);
    reconciler.update(&mut resource, &previous).await.unwrap();

    assert_eq!(resource.state, LifecycleState::Synced);
    let obj = store
        .directory
        .get(resource.reference.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(obj.port, 5080);
    assert_eq!(obj.priority, 1);
    assert_eq!(obj.effective_ttl(), Ttl::Seconds(300));
}
