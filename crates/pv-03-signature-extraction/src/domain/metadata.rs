//! # Signature Metadata
//!
//! What extraction persists about a signed package. Written once per
//! validation; re-extraction of the same package yields an identical record.

use crate::domain::certificate::ParsedCertificate;
use crate::domain::signature::{PrimarySignature, SignatureType};
use serde::{Deserialize, Serialize};
use shared_types::PackageKey;
use uuid::Uuid;

/// Certificate summary stored with the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRef {
    pub thumbprint: String,
    pub subject: String,
    pub issuer: String,
    pub not_before: i64,
    pub not_after: i64,
}

impl From<&ParsedCertificate> for CertificateRef {
    fn from(cert: &ParsedCertificate) -> Self {
        Self {
            thumbprint: cert.thumbprint.to_string(),
            subject: cert.info.subject.clone(),
            issuer: cert.info.issuer.clone(),
            not_before: cert.info.not_before,
            not_after: cert.info.not_after,
        }
    }
}

/// Timestamp summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRef {
    pub generated_at: i64,
    pub chain: Vec<CertificateRef>,
}

/// Persisted signature metadata for one validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMetadata {
    pub validation_id: Uuid,
    pub package_key: PackageKey,
    pub signature_type: SignatureType,
    /// Hex SHA-256 of the package content as declared by the signer.
    pub content_digest: String,
    pub signed_at: i64,
    /// Signing chain, leaf first.
    pub signing_chain: Vec<CertificateRef>,
    pub timestamp: Option<TimestampRef>,
}

impl SignatureMetadata {
    pub fn new(
        validation_id: Uuid,
        package_key: PackageKey,
        signature: &PrimarySignature,
        signing_chain: &[ParsedCertificate],
        timestamp_chain: Option<&[ParsedCertificate]>,
    ) -> Self {
        Self {
            validation_id,
            package_key,
            signature_type: signature.signature_type,
            content_digest: hex::encode(signature.content_digest),
            signed_at: signature.signed_at,
            signing_chain: signing_chain.iter().map(CertificateRef::from).collect(),
            timestamp: signature
                .timestamp
                .as_ref()
                .zip(timestamp_chain)
                .map(|(token, chain)| TimestampRef {
                    generated_at: token.generated_at,
                    chain: chain.iter().map(CertificateRef::from).collect(),
                }),
        }
    }

    /// Every certificate thumbprint referenced by the record.
    pub fn thumbprints(&self) -> impl Iterator<Item = &str> {
        self.signing_chain
            .iter()
            .chain(self.timestamp.iter().flat_map(|t| t.chain.iter()))
            .map(|c| c.thumbprint.as_str())
    }
}
