//! # Storage Adapters
//!
//! [`ConfiguredStore`] is the one key-value store shared by every component.
//! The backend is picked at startup from configuration.
//!
//! ## Usage
//!
//! Enable the `rocksdb` feature for the RocksDB backend:
//!
//! ```toml
//! validation-runtime = { path = "...", features = ["rocksdb"] }
//! ```

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};

use pv_01_validator_state::{
    FileBackedKVStore, InMemoryKVStore, KVStoreError, KeyValueStore, ScanResult,
};

/// Backend chosen at startup.
pub enum ConfiguredStore {
    InMemory(InMemoryKVStore),
    File(FileBackedKVStore),
    #[cfg(feature = "rocksdb")]
    RocksDb(RocksDbStore),
}

impl ConfiguredStore {
    pub fn backend_name(&self) -> &'static str {
        match self {
            ConfiguredStore::InMemory(_) => "memory",
            ConfiguredStore::File(_) => "file",
            #[cfg(feature = "rocksdb")]
            ConfiguredStore::RocksDb(_) => "rocksdb",
        }
    }

    fn inner(&self) -> &dyn KeyValueStore {
        match self {
            ConfiguredStore::InMemory(store) => store,
            ConfiguredStore::File(store) => store,
            #[cfg(feature = "rocksdb")]
            ConfiguredStore::RocksDb(store) => store,
        }
    }
}

impl KeyValueStore for ConfiguredStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.inner().get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.inner().put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.inner().delete(key)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.inner().exists(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        self.inner().prefix_scan(prefix)
    }

    fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, KVStoreError> {
        self.inner().compare_and_swap(key, expected, new)
    }
}
