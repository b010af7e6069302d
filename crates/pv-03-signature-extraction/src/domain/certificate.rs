//! # Certificates
//!
//! A certificate binds a subject name to an Ed25519 public key for a validity
//! window, signed by its issuer over the to-be-signed fields. Certificates are
//! exchanged in their `bincode` encoding; the thumbprint is computed over
//! exactly those bytes.

use crate::domain::errors::ExtractionError;
use pv_02_certificate_store::Thumbprint;
use serde::{Deserialize, Serialize};

/// Decoded certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub serial: u64,
    pub subject: String,
    pub issuer: String,
    /// Ed25519 public key of the subject.
    pub public_key: [u8; 32],
    /// Unix seconds, inclusive.
    pub not_before: i64,
    /// Unix seconds, inclusive.
    pub not_after: i64,
    /// Whether the subject may issue certificates.
    pub is_ca: bool,
    /// Issuer's Ed25519 signature over [`CertificateInfo::tbs_bytes`].
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct ToBeSigned<'a> {
    serial: u64,
    subject: &'a str,
    issuer: &'a str,
    public_key: &'a [u8; 32],
    not_before: i64,
    not_after: i64,
    is_ca: bool,
}

impl CertificateInfo {
    /// Bytes covered by the issuer's signature.
    pub fn tbs_bytes(&self) -> Vec<u8> {
        let tbs = ToBeSigned {
            serial: self.serial,
            subject: &self.subject,
            issuer: &self.issuer,
            public_key: &self.public_key,
            not_before: self.not_before,
            not_after: self.not_after,
            is_ca: self.is_ca,
        };
        // Serializing plain fields into a Vec cannot fail
        bincode::serialize(&tbs).unwrap_or_default()
    }

    pub fn encode(&self) -> Result<Vec<u8>, ExtractionError> {
        bincode::serialize(self).map_err(|e| ExtractionError::MalformedSignature(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ExtractionError> {
        bincode::deserialize(bytes)
            .map_err(|e| ExtractionError::MalformedSignature(format!("certificate: {}", e)))
    }

    /// Whether `at` (unix seconds) falls in the validity window.
    pub fn is_valid_at(&self, at: i64) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Whether the certificate names itself as issuer.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}

/// A certificate with its encoded form and thumbprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    pub info: CertificateInfo,
    pub encoded: Vec<u8>,
    pub thumbprint: Thumbprint,
}

impl ParsedCertificate {
    pub fn parse(encoded: &[u8]) -> Result<Self, ExtractionError> {
        Ok(Self {
            info: CertificateInfo::decode(encoded)?,
            encoded: encoded.to_vec(),
            thumbprint: Thumbprint::of(encoded),
        })
    }
}

/// Parse an ordered chain (leaf first).
pub fn parse_chain(encoded: &[Vec<u8>]) -> Result<Vec<ParsedCertificate>, ExtractionError> {
    encoded.iter().map(|c| ParsedCertificate::parse(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CertificateInfo {
        CertificateInfo {
            serial: 7,
            subject: "CN=Contoso".into(),
            issuer: "CN=Contoso Root".into(),
            public_key: [3u8; 32],
            not_before: 1_000,
            not_after: 2_000,
            is_ca: false,
            signature: vec![9u8; 64],
        }
    }

    /// Test: Encoded certificate parses back with a stable thumbprint
    #[test]
    fn test_parse_encoded() {
        let encoded = sample().encode().unwrap();
        let parsed = ParsedCertificate::parse(&encoded).unwrap();
        assert_eq!(parsed.info, sample());
        assert_eq!(parsed.thumbprint, Thumbprint::of(&encoded));
    }

    /// Test: Signature is not part of the to-be-signed bytes
    #[test]
    fn test_tbs_excludes_signature() {
        let mut other = sample();
        other.signature = vec![1u8; 64];
        assert_eq!(sample().tbs_bytes(), other.tbs_bytes());

        other.subject = "CN=Fabrikam".into();
        assert_ne!(sample().tbs_bytes(), other.tbs_bytes());
    }

    /// Test: Validity window is inclusive
    #[test]
    fn test_validity_window() {
        let cert = sample();
        assert!(cert.is_valid_at(1_000));
        assert!(cert.is_valid_at(2_000));
        assert!(!cert.is_valid_at(999));
        assert!(!cert.is_valid_at(2_001));
    }

    /// Test: Garbage bytes are a malformed signature
    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            ParsedCertificate::parse(&[1, 2, 3]),
            Err(ExtractionError::MalformedSignature(_))
        ));
    }
}
