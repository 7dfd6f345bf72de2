//! Error types for srvsync
//!
//! This module defines all error types used throughout the crate.
//!
//! The reconciliation protocol only recovers locally from [`Error::NotFound`]
//! (it drives the absent transition). Everything else is surfaced to the
//! caller with the original failure's message preserved.

use thiserror::Error;

/// Result type alias for srvsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for srvsync
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input or an attempt to mutate a creation-time-only field
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// More than one remote object carries the same internal identity
    #[error(
        "Ambiguous match: {count} objects of kind '{kind}' carry {key}={value}; \
         operator intervention required"
    )]
    AmbiguousMatch {
        /// Resource kind that was searched
        kind: String,
        /// Attribute key used for the search
        key: String,
        /// Attribute value used for the search
        value: String,
        /// Number of objects returned
        count: usize,
    },

    /// Failure reported by an object store (transport or remote service)
    #[error("Object store error ({store}): {message}")]
    Store {
        /// Store name
        store: String,
        /// Error message
        message: String,
    },

    /// The remote object could not be decoded into a record
    #[error("Failed to decode remote object: {0}")]
    Decode(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an ambiguous match error
    pub fn ambiguous_match(
        kind: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        count: usize,
    ) -> Self {
        Self::AmbiguousMatch {
            kind: kind.into(),
            key: key.into(),
            value: value.into(),
            count,
        }
    }

    /// Create an object store error
    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Whether this error means the remote object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error must never be retried
    ///
    /// Validation failures, duplicate identities and undecodable objects
    /// need an operator; retrying cannot change the outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::AmbiguousMatch { .. } | Self::Decode(_) | Self::Config(_)
        )
    }

    /// Prefix the message with context, keeping the variant
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            Self::Validation(m) => Self::Validation(format!("{}: {}", ctx, m)),
            Self::NotFound(m) => Self::NotFound(format!("{}: {}", ctx, m)),
            Self::Store { store, message } => Self::Store {
                store,
                message: format!("{}: {}", ctx, message),
            },
            Self::Decode(m) => Self::Decode(format!("{}: {}", ctx, m)),
            Self::StateStore(m) => Self::StateStore(format!("{}: {}", ctx, m)),
            Self::Other(m) => Self::Other(format!("{}: {}", ctx, m)),
            other => other,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
