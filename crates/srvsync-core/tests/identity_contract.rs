//! Contract Test: Stable Internal Identity
//!
//! Constraints verified:
//! - Create mints a token and stamps it on the remote object
//! - The token is write-once: never regenerated, never changed by the caller
//! - The token finds the object again after its reference changes
//! - The token never shows up in the caller's attributes
//! - A blank token in persisted state counts as no token
//! - Update looks the object up by the last known reference, not the caller's

mod common;

use common::*;
use serde_json::json;
use srvsync_core::{
    DeclaredResource, Error, InternalId, LifecycleState, ReadOutcome, ReconcileEvent,
};

#[tokio::test]
async fn create_stamps_token_on_remote_object() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut resource = sip_record().with_attribute("Site", json!("ams1"));
    reconciler.create(&mut resource).await.unwrap();

    let id = resource.internal_id.clone().expect("identity assigned");
    let obj = store
        .directory
        .get(resource.reference.as_deref().unwrap())
        .await
        .unwrap();

    assert_eq!(obj.attributes.get(ID_KEY), Some(&json!(id.as_str())));
    assert!(!resource.attributes.contains_key(ID_KEY));
}

#[tokio::test]
async fn token_survives_update_and_read() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut resource = sip_record();
    reconciler.create(&mut resource).await.unwrap();
    let id = resource.internal_id.clone().unwrap();

    let previous = resource.clone();
    resource.port = 5061;
    reconciler.update(&mut resource, &previous).await.unwrap();
    assert_eq!(resource.internal_id.as_ref(), Some(&id));

    reconciler.read(&mut resource).await.unwrap();
    assert_eq!(resource.internal_id.as_ref(), Some(&id));

    let obj = store
        .directory
        .get(resource.reference.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(obj.internal_id(ID_KEY), Some(id));
}

#[tokio::test]
async fn update_without_identity_in_declaration_inherits_it() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut previous = sip_record();
    reconciler.create(&mut previous).await.unwrap();

    // A fresh declaration, as rebuilt from configuration
    let mut resource = sip_record().with_comment("now with comment");
    reconciler.update(&mut resource, &previous).await.unwrap();

    assert_eq!(resource.internal_id, previous.internal_id);
    assert_eq!(resource.reference, previous.reference);
    assert_eq!(resource.comment, "now with comment");
}

#[tokio::test]
async fn changing_token_is_rejected() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut previous = sip_record();
    reconciler.create(&mut previous).await.unwrap();

    let mut resource = previous.clone();
    resource.internal_id = Some(InternalId::generate());
    resource.port = 5061;

    let err = reconciler.update(&mut resource, &previous).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(resource, previous, "declaration restored");
    assert_eq!(store.count(Op::Update), 0);
}

#[tokio::test]
async fn reference_churn_is_healed_through_token() {
    let store = InstrumentedStore::new();
    let (reconciler, mut events) = reconciler(&store);

    let mut resource = sip_record();
    reconciler.create(&mut resource).await.unwrap();
    let old_reference = resource.reference.clone().unwrap();

    let new_reference = store.directory.rereference(&old_reference).await.unwrap();
    assert_ne!(new_reference, old_reference);
    drain(&mut events);

    assert_eq!(reconciler.read(&mut resource).await.unwrap(), ReadOutcome::Present);
    assert_eq!(resource.reference.as_deref(), Some(new_reference.as_str()));
    assert_eq!(resource.state, LifecycleState::Synced);

    assert_eq!(
        drain(&mut events),
        vec![ReconcileEvent::Synced {
            name: "_sip._udp.example.com".to_string(),
            reference: new_reference,
        }]
    );
}

#[tokio::test]
async fn read_adopts_token_found_on_remote_object() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut attributes = srvsync_core::AttributeSet::new();
    attributes.insert(ID_KEY.to_string(), json!("adopted-token"));
    let reference = store
        .directory
        .insert(foreign_object("_ldap._tcp.example.com", attributes))
        .await;

    let mut resource = sip_record();
    resource.reference = Some(reference);
    reconciler.read(&mut resource).await.unwrap();

    assert_eq!(resource.internal_id, InternalId::parse("adopted-token"));
}

#[tokio::test]
async fn blank_persisted_token_is_treated_as_absent() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut resource: DeclaredResource = serde_json::from_value(json!({
        "name": "_sip._udp.example.com",
        "priority": 10,
        "weight": 20,
        "port": 5060,
        "target": "sip.example.com",
        "internal_id": "  "
    }))
    .unwrap();
    assert_eq!(resource.internal_id, None);

    reconciler.create(&mut resource).await.unwrap();
    assert!(resource.internal_id.is_some());
    assert_eq!(store.directory.len().await, 1);
}

#[tokio::test]
async fn update_ignores_caller_supplied_reference() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut decoy =
        DeclaredResource::new("_xmpp._tcp.example.com", 5, 0, 5222, "xmpp.example.com");
    reconciler.create(&mut decoy).await.unwrap();

    let mut previous = sip_record();
    reconciler.create(&mut previous).await.unwrap();

    let mut resource = previous.clone();
    resource.reference = decoy.reference.clone();
    resource.port = 5080;
    reconciler.update(&mut resource, &previous).await.unwrap();

    let ours = store
        .directory
        .get(resource.reference.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(ours.name, "_sip._udp.example.com");
    assert_eq!(ours.port, 5080);

    let untouched = store
        .directory
        .get(decoy.reference.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(untouched.port, 5222);
}
