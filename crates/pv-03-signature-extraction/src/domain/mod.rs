//! Domain layer: package layout, signature and certificate formats, metadata.

pub mod archive;
pub mod certificate;
pub mod errors;
pub mod metadata;
pub mod signature;

pub use archive::{seal_package, split_package, PackageParts, SIGNATURE_MAGIC};
pub use certificate::{parse_chain, CertificateInfo, ParsedCertificate};
pub use errors::ExtractionError;
pub use metadata::{CertificateRef, SignatureMetadata, TimestampRef};
pub use signature::{signed_attributes, PrimarySignature, SignatureType, TimestampToken};
