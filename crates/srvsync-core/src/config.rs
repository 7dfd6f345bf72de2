//! Configuration types for srvsync
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::record::ResourceKind;

/// Main srvsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrvsyncConfig {
    /// Remote directory configuration
    pub object_store: ObjectStoreConfig,

    /// Declared state persistence
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl SrvsyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            object_store: ObjectStoreConfig::default(),
            state_store: StateStoreConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.object_store.validate()?;
        self.state_store.validate()?;
        self.reconciler.validate()?;
        Ok(())
    }
}

impl Default for SrvsyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconciler settings
///
/// Everything the protocol would otherwise hard-code lives here, so two
/// reconcilers with different conventions can run side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// DNS view used when a declaration leaves it empty
    #[serde(default = "default_dns_view")]
    pub default_dns_view: String,

    /// Attribute key carrying the internal identity
    #[serde(default = "default_internal_id_key")]
    pub internal_id_key: String,

    /// Attribute keys never reported back to the caller
    #[serde(default = "default_hidden_attribute_keys")]
    pub hidden_attribute_keys: Vec<String>,

    /// Raw TTL value that means "unset"
    #[serde(default = "default_ttl_unset_sentinel")]
    pub ttl_unset_sentinel: i64,

    /// Kind of object managed
    #[serde(default)]
    pub resource_kind: ResourceKind,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    /// Validate the reconciler settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.default_dns_view.is_empty() {
            return Err(crate::Error::config("Default DNS view cannot be empty"));
        }
        if self.internal_id_key.is_empty() {
            return Err(crate::Error::config("Internal ID attribute key cannot be empty"));
        }
        if self.hidden_attribute_keys.contains(&self.internal_id_key) {
            return Err(crate::Error::config(
                "Internal ID attribute key must not be listed as a hidden attribute",
            ));
        }
        if self.ttl_unset_sentinel >= 0 {
            return Err(crate::Error::config(
                "TTL unset sentinel must be negative so it cannot collide with a real TTL",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Set the internal ID attribute key
    pub fn with_internal_id_key(mut self, key: impl Into<String>) -> Self {
        self.internal_id_key = key.into();
        self
    }

    /// Set the default DNS view
    pub fn with_default_dns_view(mut self, view: impl Into<String>) -> Self {
        self.default_dns_view = view.into();
        self
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            default_dns_view: default_dns_view(),
            internal_id_key: default_internal_id_key(),
            hidden_attribute_keys: default_hidden_attribute_keys(),
            ttl_unset_sentinel: default_ttl_unset_sentinel(),
            resource_kind: ResourceKind::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_dns_view() -> String {
    "default".to_string()
}

fn default_internal_id_key() -> String {
    "Terraform Internal ID".to_string()
}

fn default_hidden_attribute_keys() -> Vec<String> {
    Vec::new()
}

fn default_ttl_unset_sentinel() -> i64 {
    -1
}

fn default_event_channel_capacity() -> usize {
    100
}

/// Remote directory configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// Infoblox WAPI over HTTPS
    Wapi {
        /// Grid master URL, e.g. `https://gm.example.com`
        url: String,
        /// WAPI user
        username: String,
        /// WAPI password
        password: String,
        /// WAPI version, e.g. `2.7`
        #[serde(default = "default_wapi_version")]
        wapi_version: String,
        /// Verify the server certificate
        #[serde(default = "default_verify_tls")]
        verify_tls: bool,
        /// HTTP timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },

    /// In-memory directory (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ObjectStoreConfig {
    /// Validate the object store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ObjectStoreConfig::Wapi {
                url,
                username,
                password,
                wapi_version,
                timeout_secs,
                ..
            } => {
                if url.is_empty() {
                    return Err(crate::Error::config("WAPI URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "WAPI URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                if username.is_empty() {
                    return Err(crate::Error::config("WAPI username cannot be empty"));
                }
                if password.is_empty() {
                    return Err(crate::Error::config("WAPI password cannot be empty"));
                }
                if wapi_version.is_empty() {
                    return Err(crate::Error::config("WAPI version cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("WAPI timeout must be > 0"));
                }
                Ok(())
            }
            ObjectStoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
            ObjectStoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            ObjectStoreConfig::Wapi { .. } => "wapi",
            ObjectStoreConfig::Memory => "memory",
            ObjectStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_wapi_version() -> String {
    "2.7".to_string()
}

fn default_verify_tls() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("State file path cannot be empty"))
            }
            StateStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom state store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the state store type name
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }
}
