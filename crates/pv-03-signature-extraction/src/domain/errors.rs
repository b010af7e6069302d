//! Extraction errors.

use pv_01_validator_state::KVStoreError;
use pv_02_certificate_store::CertificateStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The signature block or a certificate cannot be decoded.
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Certificate store error: {0}")]
    CertificateStore(#[from] CertificateStoreError),

    #[error("Metadata storage error: {0}")]
    MetadataStore(#[from] KVStoreError),

    #[error("Metadata encoding error: {0}")]
    MetadataEncoding(String),
}

impl ExtractionError {
    /// Permanent errors are recorded as a validation failure; everything else
    /// is retried through redelivery.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ExtractionError::MalformedSignature(_))
    }
}
