//! # Signature Extraction (pv-03)
//!
//! Pulls signature parts out of a package and persists them:
//!
//! 1. Split the package into content and signature block
//! 2. Decode the primary signature, the signing chain and the timestamp chain
//! 3. Store each certificate in the certificate store (insert-if-absent)
//! 4. Record [`SignatureMetadata`] for the validation (write-once)
//!
//! A block or certificate that cannot be decoded is a permanent
//! [`ExtractionError::MalformedSignature`]; storage failures are transient.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod signing;

pub use adapters::KvSignatureMetadataRepository;
pub use domain::{
    seal_package, split_package, CertificateInfo, CertificateRef, ExtractionError,
    PackageParts, ParsedCertificate, PrimarySignature, SignatureMetadata, SignatureType,
    TimestampRef, TimestampToken,
};
pub use ports::{
    ExtractedSignature, ExtractionOutcome, SignatureExtraction, SignatureMetadataRepository,
};
pub use service::SignaturePartsExtractor;
pub use signing::{seed_from, CertificateIssuer, PackageSigner};
