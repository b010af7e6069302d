use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{KeyValueStore, ScanResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory key-value store for unit tests and single-process runs.
///
/// Compare-and-swap is atomic under the write lock.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        Ok(self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, KVStoreError> {
        let mut data = self.data.write();
        if data.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        data.insert(key.to_vec(), new.to_vec());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Test: Insert-if-absent succeeds once
    #[test]
    fn test_cas_insert_if_absent() {
        let store = InMemoryKVStore::new();
        assert!(store.compare_and_swap(b"k", None, b"v1").unwrap());
        assert!(!store.compare_and_swap(b"k", None, b"v2").unwrap());
        assert_eq!(store.get(b"k").unwrap(), Some(b"v1".to_vec()));
    }

    /// Test: Stale expected value leaves the stored value unchanged
    #[test]
    fn test_cas_stale_expected() {
        let store = InMemoryKVStore::new();
        store.put(b"k", b"v2").unwrap();
        assert!(!store.compare_and_swap(b"k", Some(b"v1"), b"v3").unwrap());
        assert_eq!(store.get(b"k").unwrap(), Some(b"v2".to_vec()));

        assert!(store.compare_and_swap(b"k", Some(b"v2"), b"v3").unwrap());
        assert_eq!(store.get(b"k").unwrap(), Some(b"v3".to_vec()));
    }

    /// Test: Prefix scan returns only matching keys in order
    #[test]
    fn test_prefix_scan() {
        let store = InMemoryKVStore::new();
        store.put(b"a:2", b"2").unwrap();
        store.put(b"a:1", b"1").unwrap();
        store.put(b"b:1", b"x").unwrap();

        let results = store.prefix_scan(b"a:").unwrap();
        assert_eq!(
            results,
            vec![
                (b"a:1".to_vec(), b"1".to_vec()),
                (b"a:2".to_vec(), b"2".to_vec())
            ]
        );
    }

    /// Test: Concurrent insert-if-absent has exactly one winner
    #[test]
    fn test_cas_concurrent_single_winner() {
        let store = Arc::new(InMemoryKVStore::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    if store
                        .compare_and_swap(b"row", None, format!("{}", i).as_bytes())
                        .unwrap()
                    {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
