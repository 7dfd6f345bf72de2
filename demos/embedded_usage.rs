//! Minimal embedding example for srvsync-core
//!
//! Drives one SRV record through its lifecycle against the in-memory
//! directory, with another "writer" editing the record in between:
//!
//! 1. create, stamping the internal identity
//! 2. another tool tags the record and the directory reassigns its reference
//! 3. update, healing the reference and keeping the foreign tag
//! 4. read back, then delete

use serde_json::json;
use srvsync_core::{
    DeclaredResource, MemoryObjectStore, ReconcileEvent, Reconciler, ReconcilerConfig, Result,
};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let directory = MemoryObjectStore::new();
    let (reconciler, mut events) =
        Reconciler::new(Box::new(directory.clone()), ReconcilerConfig::default())?;

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ReconcileEvent::RolledBack { name, error } => {
                    info!("rolled back {}: {}", name, error)
                }
                other => info!("event: {:?}", other),
            }
        }
    });

    // 1. Create
    let mut resource =
        DeclaredResource::new("_sip._udp.example.com", 10, 20, 5060, "sip.example.com")
            .with_attribute("Site", json!("ams1"));
    reconciler.create(&mut resource).await?;
    let reference = resource.reference.clone().unwrap_or_default();
    info!("created {} as {}", resource.name, reference);

    // 2. Someone else touches the record
    directory
        .set_attribute(&reference, "Owner", json!("netops"))
        .await?;
    let moved = directory.rereference(&reference).await?;
    info!("directory moved the record to {}", moved);

    // 3. Update against the previous declaration
    let previous = resource.clone();
    resource.port = 5080;
    reconciler.update(&mut resource, &previous).await?;

    if let Some(obj) = directory
        .get(resource.reference.as_deref().unwrap_or_default())
        .await
    {
        info!("remote attributes after update: {:?}", obj.attributes);
    }

    // 4. Read back and delete
    let outcome = reconciler.read(&mut resource).await?;
    info!("read: {:?}, declared attributes {:?}", outcome, resource.attributes);

    reconciler.delete(&mut resource).await?;
    info!("directory empty: {}", directory.is_empty().await);

    drop(reconciler);
    let _ = event_logger.await;
    Ok(())
}
