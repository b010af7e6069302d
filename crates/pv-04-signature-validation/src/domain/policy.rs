//! # Signing Policy and Trust
//!
//! What the registry accepts (policy) and whom it trusts (roots).

use pv_02_certificate_store::Thumbprint;
use pv_03_signature_extraction::SignatureType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Registry policy applied by minimal verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningPolicy {
    /// When false, any signed package fails with `PackageIsSigned`.
    pub allow_signed_packages: bool,
    pub accepted_signature_types: Vec<SignatureType>,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self {
            allow_signed_packages: false,
            accepted_signature_types: vec![SignatureType::Author],
        }
    }
}

impl SigningPolicy {
    /// Policy that accepts author-signed packages.
    pub fn accepting_author_signatures() -> Self {
        Self {
            allow_signed_packages: true,
            ..Self::default()
        }
    }
}

/// Trusted root thumbprints for signing and timestamping chains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustStore {
    signing_roots: HashSet<Thumbprint>,
    timestamp_roots: HashSet<Thumbprint>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signing_root(mut self, thumbprint: Thumbprint) -> Self {
        self.signing_roots.insert(thumbprint);
        self
    }

    pub fn with_timestamp_root(mut self, thumbprint: Thumbprint) -> Self {
        self.timestamp_roots.insert(thumbprint);
        self
    }

    pub fn trusts_signing_root(&self, thumbprint: &Thumbprint) -> bool {
        self.signing_roots.contains(thumbprint)
    }

    pub fn trusts_timestamp_root(&self, thumbprint: &Thumbprint) -> bool {
        self.timestamp_roots.contains(thumbprint)
    }
}
