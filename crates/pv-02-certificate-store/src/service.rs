//! Key-value backed certificate store.

use crate::domain::{CertificateStoreError, PutOutcome, Thumbprint};
use crate::ports::CertificateStore;
use async_trait::async_trait;
use pv_01_validator_state::KeyValueStore;
use std::sync::Arc;
use tracing::debug;

/// Key prefix for certificate blobs.
pub const CERTIFICATE_PREFIX: &str = "certificate:";

fn certificate_key(thumbprint: &Thumbprint) -> Vec<u8> {
    format!("{}{}", CERTIFICATE_PREFIX, thumbprint).into_bytes()
}

/// [`CertificateStore`] over any [`KeyValueStore`].
pub struct KvCertificateStore<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> KvCertificateStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Number of stored certificates.
    pub fn count(&self) -> Result<usize, CertificateStoreError> {
        Ok(self
            .store
            .prefix_scan(CERTIFICATE_PREFIX.as_bytes())?
            .len())
    }
}

#[async_trait]
impl<S: KeyValueStore + 'static> CertificateStore for KvCertificateStore<S> {
    async fn put(&self, encoded: &[u8]) -> Result<PutOutcome, CertificateStoreError> {
        if encoded.is_empty() {
            return Err(CertificateStoreError::EmptyCertificate);
        }
        let thumbprint = Thumbprint::of(encoded);
        let newly_stored = self
            .store
            .compare_and_swap(&certificate_key(&thumbprint), None, encoded)?;

        debug!(thumbprint = %thumbprint, newly_stored, "Stored certificate");
        Ok(PutOutcome {
            thumbprint,
            newly_stored,
        })
    }

    async fn get(&self, thumbprint: &Thumbprint) -> Result<Option<Vec<u8>>, CertificateStoreError> {
        match self.store.get(&certificate_key(thumbprint))? {
            Some(bytes) if Thumbprint::of(&bytes) != *thumbprint => {
                Err(CertificateStoreError::IntegrityMismatch(thumbprint.clone()))
            }
            other => Ok(other),
        }
    }

    async fn exists(&self, thumbprint: &Thumbprint) -> Result<bool, CertificateStoreError> {
        Ok(self.store.exists(&certificate_key(thumbprint))?)
    }
}
