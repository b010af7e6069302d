//! # Outbound Ports (SPI)
//!
//! Verifiers, package content and the per-package signing state store.

use crate::domain::{ContentSourceError, PackageSigningState, ValidatorError, VerifyResult};
use async_trait::async_trait;
use pv_03_signature_extraction::ExtractedSignature;
use shared_types::PackageKey;

/// One verification tier.
///
/// Decoding failures never reach a verifier: extraction reports them first.
pub trait PackageSignatureVerifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn verify(&self, package_key: &PackageKey, signature: &ExtractedSignature) -> VerifyResult;
}

/// Source of package bytes.
#[async_trait]
pub trait PackageContentSource: Send + Sync {
    /// Fetch the package. `content_url` may be empty, in which case the
    /// source locates the package by key.
    async fn fetch(
        &self,
        package_key: &PackageKey,
        content_url: &str,
    ) -> Result<Vec<u8>, ContentSourceError>;
}

/// Last-writer-wins signing state per package.
pub trait PackageSigningStateStore: Send + Sync {
    fn set(&self, state: &PackageSigningState) -> Result<(), ValidatorError>;

    fn get(&self, package_key: &PackageKey) -> Result<Option<PackageSigningState>, ValidatorError>;
}
