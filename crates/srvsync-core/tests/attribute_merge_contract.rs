//! Contract Test: Attribute Co-ownership
//!
//! Constraints verified:
//! - Attributes set by other writers survive our updates
//! - Attributes removed from the declaration are removed remotely
//! - Reads hide the identity attribute and configured hidden keys
//! - Reads report only declared keys, so an empty declaration reads back empty

mod common;

use common::*;
use serde_json::json;
use srvsync_core::{AttributeSet, ReconcilerConfig};

#[tokio::test]
async fn foreign_attribute_survives_update() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut previous = sip_record().with_attribute("Site", json!("ams1"));
    reconciler.create(&mut previous).await.unwrap();
    let reference = previous.reference.clone().unwrap();

    // Another team tags the record
    store
        .directory
        .set_attribute(&reference, "Owner", json!("netops"))
        .await
        .unwrap();

    let mut resource = previous.clone();
    resource.attributes.insert("Site".to_string(), json!("fra1"));
    reconciler.update(&mut resource, &previous).await.unwrap();

    let obj = store.directory.get(&reference).await.unwrap();
    assert_eq!(obj.attributes.get("Site"), Some(&json!("fra1")));
    assert_eq!(obj.attributes.get("Owner"), Some(&json!("netops")));
    assert!(obj.attributes.contains_key(ID_KEY));
}

#[tokio::test]
async fn removed_declared_attribute_is_removed_remotely() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut previous = sip_record()
        .with_attribute("Site", json!("ams1"))
        .with_attribute("Tier", json!("gold"));
    reconciler.create(&mut previous).await.unwrap();
    let reference = previous.reference.clone().unwrap();
    store
        .directory
        .set_attribute(&reference, "Owner", json!("netops"))
        .await
        .unwrap();

    let mut resource = previous.clone();
    resource.attributes.remove("Tier");
    reconciler.update(&mut resource, &previous).await.unwrap();

    let obj = store.directory.get(&reference).await.unwrap();
    let keys: Vec<&str> = obj.attributes.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["Owner", "Site", ID_KEY]);
}

#[tokio::test]
async fn remote_identity_value_cannot_override_ours() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut previous = sip_record();
    reconciler.create(&mut previous).await.unwrap();
    let reference = previous.reference.clone().unwrap();
    let id = previous.internal_id.clone().unwrap();

    // Someone edits the token by hand; the reference still resolves
    store
        .directory
        .set_attribute(&reference, ID_KEY, json!("tampered"))
        .await
        .unwrap();

    let mut resource = previous.clone();
    reconciler.update(&mut resource, &previous).await.unwrap();

    let obj = store.directory.get(&reference).await.unwrap();
    assert_eq!(obj.attributes.get(ID_KEY), Some(&json!(id.as_str())));
}

#[tokio::test]
async fn read_projects_declared_keys_only() {
    let store = InstrumentedStore::new();
    let (reconciler, _events) = reconciler(&store);

    let mut resource = sip_record().with_attribute("Site", json!("ams1"));
    reconciler.create(&mut resource).await.unwrap();
    let reference = resource.reference.clone().unwrap();
    store
        .directory
        .set_attribute(&reference, "Owner", json!("netops"))
        .await
        .unwrap();
    store
        .directory
        .set_attribute(&reference, "Site", json!("drifted"))
        .await
        .unwrap();

    reconciler.read(&mut resource).await.unwrap();

    let mut expected = AttributeSet::new();
    expected.insert("Site".to_string(), json!("drifted"));
    assert_eq!(resource.attributes, expected);
}

#[tokio::test]
async fn foreign_attribute_survives_read_then_update_with_nothing_declared() {
    let store = InstrumentedStore::new();
    let config = ReconcilerConfig {
        hidden_attribute_keys: vec!["Tenant ID".to_string()],
        ..Default::default()
    };
    let (reconciler, _events) = reconciler_with(&store, config);

    let mut resource = sip_record();
    reconciler.create(&mut resource).await.unwrap();
    let reference = resource.reference.clone().unwrap();
    store
        .directory
        .set_attribute(&reference, "Owner", json!("netops"))
        .await
        .unwrap();
    store
        .directory
        .set_attribute(&reference, "Tenant ID", json!("t-42"))
        .await
        .unwrap();

    reconciler.read(&mut resource).await.unwrap();
    assert!(resource.attributes.is_empty());

    let previous = resource.clone();
    let mut next = sip_record();
    reconciler.update(&mut next, &previous).await.unwrap();

    let obj = store
        .directory
        .get(next.reference.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(obj.attributes.get("Owner"), Some(&json!("netops")));
    assert_eq!(obj.attributes.get("Tenant ID"), Some(&json!("t-42")));
    assert!(next.attributes.is_empty());
}

#[tokio::test]
async fn custom_identity_key_is_honoured() {
    let store = InstrumentedStore::new();
    let config = ReconcilerConfig::default().with_internal_id_key("Sync Token");
    let (reconciler, _events) = reconciler_with(&store, config);

    let mut resource = sip_record();
    reconciler.create(&mut resource).await.unwrap();

    let obj = store
        .directory
        .get(resource.reference.as_deref().unwrap())
        .await
        .unwrap();
    assert!(obj.attributes.contains_key("Sync Token"));
    assert!(!obj.attributes.contains_key(ID_KEY));
}
