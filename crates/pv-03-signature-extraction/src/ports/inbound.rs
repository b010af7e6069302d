//! # Inbound Port
//!
//! Extraction API used by the verification handler.

use crate::domain::{ExtractionError, ParsedCertificate, PrimarySignature, SignatureMetadata};
use async_trait::async_trait;
use shared_types::PackageKey;
use uuid::Uuid;

/// Everything extracted from a signed package.
#[derive(Debug, Clone)]
pub struct ExtractedSignature {
    pub signature: PrimarySignature,
    /// Decoded signing chain, leaf first.
    pub signing_chain: Vec<ParsedCertificate>,
    /// Decoded timestamp chain, if the signature is timestamped.
    pub timestamp_chain: Option<Vec<ParsedCertificate>>,
    /// SHA-256 of the content actually present in the package.
    pub actual_content_digest: [u8; 32],
    pub metadata: SignatureMetadata,
    /// Certificates written for the first time by this extraction.
    pub certificates_stored: usize,
    /// Whether this extraction wrote the metadata record.
    pub metadata_written: bool,
}

/// Result of extracting a package.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    /// No signature block. Nothing persisted.
    Unsigned,
    Signed(Box<ExtractedSignature>),
}

/// Pulls signature parts out of a package and persists them.
#[async_trait]
pub trait SignatureExtraction: Send + Sync {
    /// Extract and persist. Idempotent per `validation_id`.
    async fn extract(
        &self,
        validation_id: Uuid,
        package_key: &PackageKey,
        package: &[u8],
    ) -> Result<ExtractionOutcome, ExtractionError>;
}
