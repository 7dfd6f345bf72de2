// # Object Store Implementations
//
// Directory implementations bundled with the core. Network-backed stores
// live in their own crates.

pub mod memory;

pub use memory::{MemoryObjectStore, MemoryObjectStoreFactory};
