//! Internal identity tokens
//!
//! A remote object's reference is assigned by the directory and may change on
//! every update. The internal identity is a token we mint once, store as an
//! extensible attribute on the remote object, and mirror in the declared
//! state, so the object can be found again when its reference goes stale.

use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;

/// Stable, process-independent identity of a managed object
///
/// Values are write-once per resource: nothing in the reconciler replaces a
/// non-empty identity with a different one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct InternalId(String);

impl InternalId {
    /// Mint a fresh identity (random 128-bit UUID, hyphenated)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap a previously stored identity
    ///
    /// The format is not checked; anything we emitted before parses back.
    /// Blank input means "no identity" and yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    /// The string form written to the remote attribute
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for InternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).ok_or_else(|| de::Error::custom("internal id must not be blank"))
    }
}

/// Deserialize an optional identity, treating blank strings as absent
///
/// Use with `#[serde(default, deserialize_with = "...")]` on state fields.
pub fn deserialize_optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<InternalId>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(InternalId::parse))
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
