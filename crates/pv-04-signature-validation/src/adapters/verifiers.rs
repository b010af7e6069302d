//! # Verifiers
//!
//! - [`MinimalPackageSignatureVerifier`]: structural and policy checks only
//! - [`FullPackageSignatureVerifier`]: signature, timestamp, chain trust and
//!   certificate validity at signing time

use crate::domain::chain::{first_invalid_at, verify_chain, verify_ed25519};
use crate::domain::{SigningPolicy, TrustStore, VerifyResult};
use crate::ports::outbound::PackageSignatureVerifier;
use pv_01_validator_state::{SystemTimeSource, TimeSource};
use pv_03_signature_extraction::ExtractedSignature;
use shared_types::{IssueCode, PackageKey, ValidationIssue};
use std::sync::Arc;

/// Ed25519 signature length.
const SIGNATURE_LEN: usize = 64;

// =============================================================================
// MINIMAL
// =============================================================================

pub struct MinimalPackageSignatureVerifier {
    policy: SigningPolicy,
}

impl MinimalPackageSignatureVerifier {
    pub fn new(policy: SigningPolicy) -> Self {
        Self { policy }
    }
}

impl PackageSignatureVerifier for MinimalPackageSignatureVerifier {
    fn name(&self) -> &'static str {
        "minimal"
    }

    fn verify(&self, package_key: &PackageKey, extracted: &ExtractedSignature) -> VerifyResult {
        let signature = &extracted.signature;
        let mut issues = Vec::new();

        if !self.policy.allow_signed_packages {
            issues.push(ValidationIssue::package_is_signed(
                &package_key.id,
                &package_key.version,
            ));
        }
        if !self
            .policy
            .accepted_signature_types
            .contains(&signature.signature_type)
        {
            issues.push(
                ValidationIssue::new(
                    IssueCode::UnsupportedSignatureType,
                    format!("{} signatures are not accepted", signature.signature_type),
                )
                .with_data("signature_type", signature.signature_type.to_string()),
            );
        }
        if signature.certificates.is_empty() {
            issues.push(ValidationIssue::new(
                IssueCode::MalformedSignature,
                "signature carries no certificates",
            ));
        }
        if signature.signature.len() != SIGNATURE_LEN {
            issues.push(
                ValidationIssue::new(IssueCode::MalformedSignature, "signature has the wrong length")
                    .with_data("length", signature.signature.len().to_string()),
            );
        }
        if signature.content_digest != extracted.actual_content_digest {
            issues.push(ValidationIssue::new(
                IssueCode::ContentHashMismatch,
                "package content does not match the signed digest",
            ));
        }

        if issues.is_empty() {
            VerifyResult::Valid
        } else {
            VerifyResult::Invalid(issues)
        }
    }
}

// =============================================================================
// FULL
// =============================================================================

pub struct FullPackageSignatureVerifier {
    trust: TrustStore,
    clock: Arc<dyn TimeSource>,
}

impl FullPackageSignatureVerifier {
    pub fn new(trust: TrustStore) -> Self {
        Self {
            trust,
            clock: Arc::new(SystemTimeSource),
        }
    }

    /// Use a custom clock for "now" when no timestamp is present.
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Verify the timestamp token. Returns the asserted time.
    fn verify_timestamp(&self, extracted: &ExtractedSignature) -> Result<Option<i64>, ValidationIssue> {
        let Some(token) = &extracted.signature.timestamp else {
            return Ok(None);
        };
        let invalid = |reason: String| ValidationIssue::new(IssueCode::TimestampInvalid, reason);

        let chain = extracted
            .timestamp_chain
            .as_deref()
            .ok_or_else(|| invalid("timestamp certificates missing".to_string()))?;
        let authority = chain
            .first()
            .ok_or_else(|| invalid("timestamp chain is empty".to_string()))?;

        let message = extracted.signature.timestamp_message(token.generated_at);
        if !verify_ed25519(&authority.info.public_key, &message, &token.signature) {
            return Err(invalid("timestamp signature does not verify".to_string()));
        }
        verify_chain(chain, |t| self.trust.trusts_timestamp_root(t))
            .map_err(|fault| invalid(format!("timestamp chain: {}", fault.describe())))?;
        if let Some(cert) = first_invalid_at(chain, token.generated_at) {
            return Err(invalid(format!(
                "timestamp certificate {} not valid at {}",
                cert.info.subject, token.generated_at
            )));
        }
        Ok(Some(token.generated_at))
    }

    fn check(&self, extracted: &ExtractedSignature) -> Result<(), ValidationIssue> {
        let signature = &extracted.signature;
        let leaf = extracted.signing_chain.first().ok_or_else(|| {
            ValidationIssue::new(IssueCode::MalformedSignature, "signing chain is empty")
        })?;

        if !verify_ed25519(
            &leaf.info.public_key,
            &signature.signed_attributes(),
            &signature.signature,
        ) {
            return Err(ValidationIssue::new(
                IssueCode::SignatureInvalid,
                "primary signature does not verify with the signing certificate",
            )
            .with_data("thumbprint", leaf.thumbprint.to_string()));
        }

        let signing_time = self
            .verify_timestamp(extracted)?
            .unwrap_or_else(|| self.clock.now().timestamp());

        verify_chain(&extracted.signing_chain, |t| self.trust.trusts_signing_root(t)).map_err(
            |fault| ValidationIssue::new(IssueCode::UntrustedChain, fault.describe()),
        )?;

        if let Some(cert) = first_invalid_at(&extracted.signing_chain, signing_time) {
            return Err(ValidationIssue::new(
                IssueCode::CertificateExpired,
                format!("certificate {} is not valid at signing time", cert.info.subject),
            )
            .with_data("thumbprint", cert.thumbprint.to_string())
            .with_data("signing_time", signing_time.to_string()));
        }
        Ok(())
    }
}

impl PackageSignatureVerifier for FullPackageSignatureVerifier {
    fn name(&self) -> &'static str {
        "full"
    }

    fn verify(&self, _package_key: &PackageKey, extracted: &ExtractedSignature) -> VerifyResult {
        match self.check(extracted) {
            Ok(()) => VerifyResult::Valid,
            Err(issue) => VerifyResult::invalid(issue),
        }
    }
}
