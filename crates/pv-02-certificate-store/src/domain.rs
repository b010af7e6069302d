//! # Certificate Domain
//!
//! Certificates are immutable blobs addressed by the SHA-256 of their encoded
//! bytes. The same bytes always map to the same thumbprint, so storing is
//! naturally idempotent.

use pv_01_validator_state::KVStoreError;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Lowercase hex SHA-256 of a certificate's encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Thumbprint(String);

impl Thumbprint {
    /// Thumbprint of `encoded`.
    pub fn of(encoded: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(encoded)))
    }

    /// Parse a thumbprint string (64 hex chars, any case).
    pub fn parse(value: &str) -> Result<Self, CertificateStoreError> {
        let lower = value.trim().to_ascii_lowercase();
        let valid = lower.len() == 64 && lower.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(CertificateStoreError::InvalidThumbprint(value.to_string()));
        }
        Ok(Self(lower))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of [`crate::CertificateStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub thumbprint: Thumbprint,
    /// `false` when the certificate was already present.
    pub newly_stored: bool,
}

/// Certificate store errors.
#[derive(Debug, Error)]
pub enum CertificateStoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    /// Stored bytes do not hash to their key.
    #[error("Stored certificate {0} does not match its thumbprint")]
    IntegrityMismatch(Thumbprint),

    #[error("Invalid thumbprint: {0}")]
    InvalidThumbprint(String),

    #[error("Empty certificate")]
    EmptyCertificate,
}

impl CertificateStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CertificateStoreError::Storage(KVStoreError::IOError { .. })
                | CertificateStoreError::Storage(KVStoreError::Locked { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: Thumbprint is lowercase hex SHA-256
    #[test]
    fn test_thumbprint_of() {
        let thumbprint = Thumbprint::of(b"abc");
        assert_eq!(
            thumbprint.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    /// Test: Parsing normalizes case and rejects garbage
    #[test]
    fn test_thumbprint_parse() {
        let upper = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        assert_eq!(Thumbprint::parse(upper).unwrap(), Thumbprint::of(b"abc"));
        assert!(Thumbprint::parse("xyz").is_err());
        assert!(Thumbprint::parse(&"g".repeat(64)).is_err());
    }
}
