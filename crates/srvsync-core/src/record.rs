//! SRV record state types
//!
//! - [`DeclaredResource`]: what the caller wants, plus the identity we track
//! - [`RemoteObject`]: a snapshot of the directory's live object
//! - [`SrvFields`]: the scalar payload written to the directory

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::identity::InternalId;

/// Extensible attributes: name -> value
pub type AttributeSet = BTreeMap<String, serde_json::Value>;

/// Kind of directory object managed by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResourceKind {
    /// DNS SRV record
    #[default]
    #[serde(rename = "record:srv")]
    Srv,
}

impl ResourceKind {
    /// Object type name as the directory spells it
    pub fn wire_name(&self) -> &'static str {
        match self {
            ResourceKind::Srv => "record:srv",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Time-to-live of a record
///
/// `Unset` means the record inherits the zone's TTL. It is serialized as
/// `null`, never as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum Ttl {
    /// No record-level TTL
    #[default]
    Unset,
    /// Explicit TTL in seconds
    Seconds(u32),
}

impl Ttl {
    /// Convert a raw user-supplied value
    ///
    /// `sentinel` is the configured "unset" marker. Other negative values are
    /// rejected.
    pub fn from_raw(raw: i64, sentinel: i64) -> Result<Self> {
        if raw == sentinel {
            return Ok(Ttl::Unset);
        }
        if raw < 0 {
            return Err(Error::validation("TTL value must be 0 or higher"));
        }
        u32::try_from(raw)
            .map(Ttl::Seconds)
            .map_err(|_| Error::validation(format!("TTL value {} is out of range", raw)))
    }

    /// Inverse of [`Ttl::from_raw`]
    pub fn to_raw(self, sentinel: i64) -> i64 {
        match self {
            Ttl::Unset => sentinel,
            Ttl::Seconds(s) => i64::from(s),
        }
    }

    /// Whether an explicit TTL is set
    pub fn is_set(&self) -> bool {
        matches!(self, Ttl::Seconds(_))
    }

    /// Seconds, if set
    pub fn seconds(&self) -> Option<u32> {
        match self {
            Ttl::Unset => None,
            Ttl::Seconds(s) => Some(*s),
        }
    }
}

impl From<Option<u32>> for Ttl {
    fn from(value: Option<u32>) -> Self {
        value.map_or(Ttl::Unset, Ttl::Seconds)
    }
}

impl From<Ttl> for Option<u32> {
    fn from(value: Ttl) -> Self {
        value.seconds()
    }
}

/// Reconciliation state of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No remote object is known
    #[default]
    Absent,
    /// Created in this pass, not yet read back
    Created,
    /// Declared state matches what was last observed or written
    Synced,
    /// An update is in flight
    Updating,
}

/// Scalar fields written to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvFields {
    /// DNS view the record lives in
    pub dns_view: String,
    /// Service, protocol and zone, e.g. `_sip._udp.example.com`
    pub name: String,
    /// Priority (0..65535, checked by the directory)
    pub priority: u32,
    /// Weight (0..65535, checked by the directory)
    pub weight: u32,
    /// Port (0..65535, checked by the directory)
    pub port: u32,
    /// Host providing the service
    pub target: String,
    /// Record TTL
    pub ttl: Ttl,
    /// Free-form description
    pub comment: String,
}

/// The caller's desired state for one SRV record
///
/// `reference` and `internal_id` are computed by the reconciler; callers set
/// the remaining fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredResource {
    /// DNS view; empty means the configured default. Creation-time only.
    #[serde(default)]
    pub dns_view: String,
    /// Service, protocol and zone name
    pub name: String,
    /// Priority
    pub priority: u32,
    /// Weight
    pub weight: u32,
    /// Port
    pub port: u32,
    /// Target host
    pub target: String,
    /// Record TTL
    #[serde(default)]
    pub ttl: Ttl,
    /// Description
    #[serde(default)]
    pub comment: String,
    /// Extensible attributes owned by the caller
    #[serde(default)]
    pub attributes: AttributeSet,
    /// Last known remote reference
    #[serde(default)]
    pub reference: Option<String>,
    /// Identity stamped on the remote object; blank stored values read as none
    #[serde(default, deserialize_with = "crate::identity::deserialize_optional")]
    pub internal_id: Option<InternalId>,
    /// Where the resource is in its lifecycle
    #[serde(default)]
    pub state: LifecycleState,
}

impl DeclaredResource {
    /// Create a declaration with the required fields
    pub fn new(
        name: impl Into<String>,
        priority: u32,
        weight: u32,
        port: u32,
        target: impl Into<String>,
    ) -> Self {
        Self {
            dns_view: String::new(),
            name: name.into(),
            priority,
            weight,
            port,
            target: target.into(),
            ttl: Ttl::Unset,
            comment: String::new(),
            attributes: AttributeSet::new(),
            reference: None,
            internal_id: None,
            state: LifecycleState::Absent,
        }
    }

    /// Set the DNS view
    pub fn with_dns_view(mut self, dns_view: impl Into<String>) -> Self {
        self.dns_view = dns_view.into();
        self
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Add an extensible attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Scalar payload for a store write
    pub fn fields(&self) -> SrvFields {
        SrvFields {
            dns_view: self.dns_view.clone(),
            name: self.name.clone(),
            priority: self.priority,
            weight: self.weight,
            port: self.port,
            target: self.target.clone(),
            ttl: self.ttl,
            comment: self.comment.clone(),
        }
    }

    /// Forget the remote object
    pub fn clear_identity(&mut self) {
        self.reference = None;
        self.internal_id = None;
        self.state = LifecycleState::Absent;
    }

    /// Copy the remote object's scalar fields into this declaration
    ///
    /// A disabled remote TTL always reads back as [`Ttl::Unset`].
    pub fn absorb_fields(&mut self, remote: &RemoteObject) {
        self.dns_view = remote.dns_view.clone();
        self.name = remote.name.clone();
        self.priority = remote.priority;
        self.weight = remote.weight;
        self.port = remote.port;
        self.target = remote.target.clone();
        self.ttl = remote.effective_ttl();
        self.comment = remote.comment.clone();
        self.reference = Some(remote.reference.clone());
    }
}

/// Snapshot of an SRV record held by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Server-assigned reference; may change on update
    pub reference: String,
    /// DNS view
    pub dns_view: String,
    /// Record name
    pub name: String,
    /// Priority
    pub priority: u32,
    /// Weight
    pub weight: u32,
    /// Port
    pub port: u32,
    /// Target host
    pub target: String,
    /// Stored TTL, meaningful only when `use_ttl` is set
    pub ttl: Option<u32>,
    /// Whether the record-level TTL is in effect
    pub use_ttl: bool,
    /// Description
    pub comment: String,
    /// All extensible attributes, ours and foreign
    pub attributes: AttributeSet,
}

impl RemoteObject {
    /// TTL as the caller should see it
    pub fn effective_ttl(&self) -> Ttl {
        if self.use_ttl {
            Ttl::Seconds(self.ttl.unwrap_or(0))
        } else {
            Ttl::Unset
        }
    }

    /// Identity token stored under `key`, if any
    pub fn internal_id(&self, key: &str) -> Option<InternalId> {
        self.attributes
            .get(key)
            .and_then(|v| v.as_str())
            .and_then(InternalId::parse)
    }
}
