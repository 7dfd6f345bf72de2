// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Keeps the previous declaration of every resource across runs, so the
// next pass knows which attributes it owned and where the remote object is.
//
// ## Crash Recovery
//
// - Atomic writes: write to `.tmp`, then rename over the state file
// - Backup: the file being replaced is copied to `.backup` first
// - Recovery: a state file that does not parse is replaced by its backup
// - Read errors other than corruption are reported, never papered over
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "sip": {
//       "resource": {
//         "dns_view": "default",
//         "name": "_sip._udp.example.com",
//         "priority": 10,
//         "weight": 20,
//         "port": 5060,
//         "target": "sip.example.com",
//         "ttl": null,
//         "comment": "",
//         "attributes": { "Site": "ams1" },
//         "reference": "record:srv/ZG5z...:_sip._udp.example.com/default",
//         "internal_id": "6f1c...",
//         "state": "synced"
//       },
//       "last_updated": "2026-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::record::DeclaredResource;
use crate::traits::state_store::{StateRecord, StateStore, StateStoreFactory};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

type Records = BTreeMap<String, StateRecord>;

/// File-based state store with crash recovery
///
/// Every mutation is written through to disk before the call returns.
///
/// # Example
///
/// ```rust,no_run
/// use srvsync_core::record::DeclaredResource;
/// use srvsync_core::state::FileStateStore;
/// use srvsync_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/srvsync/state.json").await?;
///     let resource = DeclaredResource::new("_sip._udp.example.com", 10, 20, 5060, "sip.example.com");
///
///     store.put_resource("sip", &resource).await?;
///     assert!(store.get_resource("sip").await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    records: Records,
    dirty: bool,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    records: Records,
}

/// Why a state file could not be loaded
#[derive(Debug)]
enum LoadFailure {
    /// The file exists but is not a valid state file
    Corrupt(String),
    /// The file could not be read at all
    Unreadable(Error),
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// Creates missing parent directories. A corrupt state file is replaced
    /// by its backup; if there is no usable backup the store starts empty.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                records,
                dirty: false,
            })),
        })
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<Records, Error> {
        let reason = match Self::load(path).await {
            Ok(records) => {
                tracing::debug!("Loaded state from file: {} records", records.len());
                return Ok(records);
            }
            Err(LoadFailure::Unreadable(e)) => return Err(e),
            Err(LoadFailure::Corrupt(reason)) => reason,
        };

        tracing::warn!(
            "State file {} is corrupted ({}). Attempting recovery from backup.",
            path.display(),
            reason
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty state.");
            return Ok(Records::new());
        }

        match Self::load(&backup_path).await {
            Ok(records) => {
                tracing::info!("Recovered state from backup: {} records", records.len());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore state file from backup: {}", e);
                }
                Ok(records)
            }
            Err(LoadFailure::Corrupt(backup_reason)) => {
                tracing::error!(
                    "Backup also corrupted ({}). Starting with empty state.",
                    backup_reason
                );
                Ok(Records::new())
            }
            Err(LoadFailure::Unreadable(e)) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<Records, LoadFailure> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(Records::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadFailure::Unreadable(Error::state_store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            )))
        })?;

        let state_file: StateFileFormat =
            serde_json::from_str(&content).map_err(|e| LoadFailure::Corrupt(e.to_string()))?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file.records)
    }

    async fn write_state(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;

        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            records: guard.records.clone(),
        };
        let json = serde_json::to_string_pretty(&state_file)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.sync_all().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        guard.dirty = false;
        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    async fn mutate(&self, apply: impl FnOnce(&mut Records)) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            apply(&mut guard.records);
            guard.dirty = true;
        }
        self.write_state().await
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_resource(&self, address: &str) -> Result<Option<DeclaredResource>, Error> {
        let guard = self.state.read().await;
        Ok(guard.records.get(address).map(|r| r.resource.clone()))
    }

    async fn get_record(&self, address: &str) -> Result<Option<StateRecord>, Error> {
        let guard = self.state.read().await;
        Ok(guard.records.get(address).cloned())
    }

    async fn put_resource(&self, address: &str, resource: &DeclaredResource) -> Result<(), Error> {
        let record = StateRecord::new(resource.clone());
        self.mutate(|records| {
            records.insert(address.to_string(), record);
        })
        .await
    }

    async fn set_record(&self, address: &str, record: &StateRecord) -> Result<(), Error> {
        self.mutate(|records| {
            records.insert(address.to_string(), record.clone());
        })
        .await
    }

    async fn delete_record(&self, address: &str) -> Result<(), Error> {
        self.mutate(|records| {
            records.remove(address);
        })
        .await
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        let guard = self.state.read().await;
        Ok(guard.records.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write_state().await } else { Ok(()) }
    }
}

/// Factory for [`FileStateStore`]
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::File { path } => Ok(Box::new(FileStateStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file state store")),
        }
    }
}
