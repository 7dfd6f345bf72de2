//! Core traits for srvsync
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ObjectStore`]: The remote directory holding live records
//! - [`StateStore`]: Persistent declared state between passes

pub mod object_store;
pub mod state_store;

pub use object_store::{ObjectStore, ObjectStoreFactory};
pub use state_store::{StateRecord, StateStore, StateStoreFactory};
