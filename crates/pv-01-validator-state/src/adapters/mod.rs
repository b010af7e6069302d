//! Adapters layer: storage implementations.

pub mod lock;
pub mod storage;

pub use lock::StoreLock;
pub use storage::{FileBackedKVStore, InMemoryKVStore};
