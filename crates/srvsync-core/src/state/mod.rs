// # State Store Implementations
//
// Implementations of the StateStore trait for different persistence
// strategies.

pub mod file;
pub mod memory;

pub use file::{FileStateStore, FileStateStoreFactory};
pub use memory::{MemoryStateStore, MemoryStateStoreFactory};
