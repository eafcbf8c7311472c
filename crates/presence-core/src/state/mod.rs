// # Presence Store Implementations
//
// This module provides implementations of the PresenceStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileStateStore, FileStateStoreFactory};
pub use memory::{MemoryStateStore, MemoryStateStoreFactory};
