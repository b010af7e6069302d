//! # Signature Validation (pv-04)
//!
//! Consumer side of the pipeline. For each verification message:
//! re-check status, download, extract, verify (minimal then full), record the
//! package signing state and advance the status row to a terminal state.
//!
//! ## Verification Tiers
//!
//! | Tier | Checks | Issues |
//! |------|--------|--------|
//! | Minimal | policy, signature type, content digest, structure | `PackageIsSigned`, `UnsupportedSignatureType`, `ContentHashMismatch`, `MalformedSignature` |
//! | Full | signature, timestamp, chain trust, validity at signing time | `SignatureInvalid`, `TimestampInvalid`, `UntrustedChain`, `CertificateExpired` |
//!
//! Full verification only runs when minimal verification passes.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod handler;
pub mod ports;
pub mod service;

pub use adapters::{
    FullPackageSignatureVerifier, InMemoryPackageContentSource, KvPackageSigningStateStore,
    MinimalPackageSignatureVerifier,
};
pub use domain::{
    ContentSourceError, PackageSigningState, PackageSigningStatus, SigningPolicy, TrustStore,
    ValidationOutcome, ValidationReport, ValidatorError, VerifyResult,
};
pub use handler::SignatureValidationMessageHandler;
pub use ports::{
    PackageContentSource, PackageSignatureVerifier, PackageSigningStateStore, SignatureValidation,
};
pub use service::{SignatureValidator, DEFAULT_DOWNLOAD_TIMEOUT};
