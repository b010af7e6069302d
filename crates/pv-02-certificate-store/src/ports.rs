//! # Inbound Port
//!
//! Content-addressed certificate storage used by the extraction step.

use crate::domain::{CertificateStoreError, PutOutcome, Thumbprint};
use async_trait::async_trait;

/// Content-addressed certificate storage.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Store `encoded` under its thumbprint. Storing the same bytes again is a
    /// no-op that reports `newly_stored == false`.
    async fn put(&self, encoded: &[u8]) -> Result<PutOutcome, CertificateStoreError>;

    /// Fetch the encoded bytes for `thumbprint`.
    async fn get(&self, thumbprint: &Thumbprint) -> Result<Option<Vec<u8>>, CertificateStoreError>;

    async fn exists(&self, thumbprint: &Thumbprint) -> Result<bool, CertificateStoreError>;
}
