//! Key-value backed signature metadata repository.
//!
//! Keys:
//! - `signature-metadata:{validation_id}` → JSON record
//! - `signature-metadata-by-package:{id}/{version}:{validation_id}` → empty index entry

use crate::domain::{ExtractionError, SignatureMetadata};
use crate::ports::outbound::SignatureMetadataRepository;
use pv_01_validator_state::KeyValueStore;
use shared_types::PackageKey;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const METADATA_PREFIX: &str = "signature-metadata:";
const PACKAGE_INDEX_PREFIX: &str = "signature-metadata-by-package:";

fn metadata_key(validation_id: Uuid) -> Vec<u8> {
    format!("{}{}", METADATA_PREFIX, validation_id).into_bytes()
}

fn package_prefix(package_key: &PackageKey) -> String {
    format!("{}{}:", PACKAGE_INDEX_PREFIX, package_key)
}

pub struct KvSignatureMetadataRepository<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> KvSignatureMetadataRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn decode(bytes: &[u8]) -> Result<SignatureMetadata, ExtractionError> {
        serde_json::from_slice(bytes).map_err(|e| ExtractionError::MetadataEncoding(e.to_string()))
    }
}

impl<S: KeyValueStore> SignatureMetadataRepository for KvSignatureMetadataRepository<S> {
    fn save(&self, metadata: &SignatureMetadata) -> Result<bool, ExtractionError> {
        let encoded = serde_json::to_vec(metadata)
            .map_err(|e| ExtractionError::MetadataEncoding(e.to_string()))?;
        let key = metadata_key(metadata.validation_id);

        let written = self.store.compare_and_swap(&key, None, &encoded)?;
        let package_key = if written {
            debug!(validation_id = %metadata.validation_id, "Saved signature metadata");
            metadata.package_key.clone()
        } else {
            match self.get(metadata.validation_id)? {
                Some(existing) => {
                    if existing != *metadata {
                        warn!(
                            validation_id = %metadata.validation_id,
                            "Re-extraction produced different metadata, keeping the original record"
                        );
                    }
                    existing.package_key
                }
                None => metadata.package_key.clone(),
            }
        };

        // Rewritten on every save, including saves that lose the CAS.
        let index_key = format!("{}{}", package_prefix(&package_key), metadata.validation_id);
        self.store.put(index_key.as_bytes(), &[])?;
        Ok(written)
    }

    fn get(&self, validation_id: Uuid) -> Result<Option<SignatureMetadata>, ExtractionError> {
        self.store
            .get(&metadata_key(validation_id))?
            .map(|bytes| Self::decode(&bytes))
            .transpose()
    }

    fn for_package(&self, package_key: &PackageKey) -> Result<Vec<SignatureMetadata>, ExtractionError> {
        let prefix = package_prefix(package_key);
        let mut records = Vec::new();
        for (key, _) in self.store.prefix_scan(prefix.as_bytes())? {
            let id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            let Ok(validation_id) = Uuid::parse_str(&id) else {
                warn!(key = %String::from_utf8_lossy(&key), "Skipping malformed index entry");
                continue;
            };
            if let Some(record) = self.get(validation_id)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignatureType;
    use pv_01_validator_state::{InMemoryKVStore, KVStoreError, ScanResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose first `failures` index writes fail.
    struct FlakyIndexStore {
        inner: InMemoryKVStore,
        failures: AtomicUsize,
    }

    impl FlakyIndexStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: InMemoryKVStore::new(),
                failures: AtomicUsize::new(failures),
            }
        }
    }

    impl KeyValueStore for FlakyIndexStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
            self.inner.get(key)
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
            if key.starts_with(PACKAGE_INDEX_PREFIX.as_bytes())
                && self
                    .failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(KVStoreError::IOError {
                    message: "timeout".to_string(),
                });
            }
            self.inner.put(key, value)
        }

        fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
            self.inner.delete(key)
        }

        fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
            self.inner.exists(key)
        }

        fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
            self.inner.prefix_scan(prefix)
        }

        fn compare_and_swap(
            &self,
            key: &[u8],
            expected: Option<&[u8]>,
            new: &[u8],
        ) -> Result<bool, KVStoreError> {
            self.inner.compare_and_swap(key, expected, new)
        }
    }

    fn metadata(package_key: PackageKey) -> SignatureMetadata {
        SignatureMetadata {
            validation_id: Uuid::new_v4(),
            package_key,
            signature_type: SignatureType::Author,
            content_digest: "ab".repeat(32),
            signed_at: 1_000,
            signing_chain: Vec::new(),
            timestamp: None,
        }
    }

    /// Test: Saved metadata is found by id and by package
    #[test]
    fn test_save_and_lookup() {
        let repository = KvSignatureMetadataRepository::new(Arc::new(InMemoryKVStore::new()));
        let key = PackageKey::new("Foo", "1.0.0");
        let record = metadata(key.clone());

        assert!(repository.save(&record).unwrap());
        assert!(!repository.save(&record).unwrap());

        assert_eq!(repository.get(record.validation_id).unwrap(), Some(record.clone()));
        assert_eq!(repository.for_package(&key).unwrap(), vec![record]);
    }

    /// Test: A retry after a failed index write makes the record findable by package
    #[test]
    fn test_retry_repairs_failed_index_write() {
        let repository = KvSignatureMetadataRepository::new(Arc::new(FlakyIndexStore::new(1)));
        let key = PackageKey::new("Foo", "1.0.0");
        let record = metadata(key.clone());

        assert!(matches!(
            repository.save(&record),
            Err(ExtractionError::MetadataStore(_))
        ));
        assert!(repository.get(record.validation_id).unwrap().is_some());
        assert!(repository.for_package(&key).unwrap().is_empty());

        assert!(!repository.save(&record).unwrap());
        assert_eq!(repository.for_package(&key).unwrap(), vec![record]);
    }

    /// Test: Different metadata on re-extraction keeps the original under its package
    #[test]
    fn test_conflicting_save_keeps_original() {
        let repository = KvSignatureMetadataRepository::new(Arc::new(InMemoryKVStore::new()));
        let original = metadata(PackageKey::new("Foo", "1.0.0"));
        let mut conflicting = original.clone();
        conflicting.package_key = PackageKey::new("Bar", "2.0.0");

        repository.save(&original).unwrap();
        assert!(!repository.save(&conflicting).unwrap());

        assert_eq!(
            repository.get(original.validation_id).unwrap(),
            Some(original.clone())
        );
        assert!(repository
            .for_package(&PackageKey::new("Bar", "2.0.0"))
            .unwrap()
            .is_empty());
    }
}
