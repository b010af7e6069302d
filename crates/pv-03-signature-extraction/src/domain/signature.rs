//! # Primary Signature
//!
//! The signature block embedded in a signed package, plus the optional
//! timestamp token countersigning it.

use crate::domain::errors::ExtractionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced the primary signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureType {
    Author,
    Repository,
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureType::Author => f.write_str("Author"),
            SignatureType::Repository => f.write_str("Repository"),
        }
    }
}

/// Timestamp authority countersignature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampToken {
    /// Unix seconds asserted by the timestamp authority.
    pub generated_at: i64,
    /// TSA signature over [`PrimarySignature::timestamp_message`].
    pub signature: Vec<u8>,
    /// Encoded TSA certificates, leaf first.
    pub certificates: Vec<Vec<u8>>,
}

/// Decoded signature block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimarySignature {
    pub signature_type: SignatureType,
    /// SHA-256 of the unsigned package content.
    pub content_digest: [u8; 32],
    /// Unix seconds claimed by the signer.
    pub signed_at: i64,
    /// Ed25519 signature by the leaf key over [`PrimarySignature::signed_attributes`].
    pub signature: Vec<u8>,
    /// Encoded signing certificates, leaf first.
    pub certificates: Vec<Vec<u8>>,
    pub timestamp: Option<TimestampToken>,
}

#[derive(Serialize)]
struct SignedAttributes<'a> {
    signature_type: SignatureType,
    content_digest: &'a [u8; 32],
    signed_at: i64,
}

impl PrimarySignature {
    /// Bytes covered by the primary signature.
    pub fn signed_attributes(&self) -> Vec<u8> {
        signed_attributes(self.signature_type, &self.content_digest, self.signed_at)
    }

    /// Bytes covered by the timestamp authority: the primary signature value
    /// bound to the asserted time.
    pub fn timestamp_message(&self, generated_at: i64) -> Vec<u8> {
        let mut message = self.signature.clone();
        message.extend_from_slice(&generated_at.to_le_bytes());
        message
    }

    pub fn encode(&self) -> Result<Vec<u8>, ExtractionError> {
        bincode::serialize(self).map_err(|e| ExtractionError::MalformedSignature(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ExtractionError> {
        bincode::deserialize(bytes)
            .map_err(|e| ExtractionError::MalformedSignature(format!("signature block: {}", e)))
    }
}

/// Signed attributes for the given fields.
pub fn signed_attributes(
    signature_type: SignatureType,
    content_digest: &[u8; 32],
    signed_at: i64,
) -> Vec<u8> {
    let attributes = SignedAttributes {
        signature_type,
        content_digest,
        signed_at,
    };
    bincode::serialize(&attributes).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: Signed attributes change with every covered field
    #[test]
    fn test_signed_attributes_cover_fields() {
        let base = signed_attributes(SignatureType::Author, &[1u8; 32], 100);
        assert_ne!(base, signed_attributes(SignatureType::Repository, &[1u8; 32], 100));
        assert_ne!(base, signed_attributes(SignatureType::Author, &[2u8; 32], 100));
        assert_ne!(base, signed_attributes(SignatureType::Author, &[1u8; 32], 101));
    }

    /// Test: Truncated block fails to decode
    #[test]
    fn test_decode_truncated() {
        let sig = PrimarySignature {
            signature_type: SignatureType::Author,
            content_digest: [0u8; 32],
            signed_at: 5,
            signature: vec![0u8; 64],
            certificates: vec![vec![1, 2, 3]],
            timestamp: None,
        };
        let encoded = sig.encode().unwrap();
        assert_eq!(PrimarySignature::decode(&encoded).unwrap(), sig);
        assert!(PrimarySignature::decode(&encoded[..encoded.len() - 2]).is_err());
    }
}
