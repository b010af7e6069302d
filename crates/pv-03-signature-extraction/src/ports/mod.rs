//! Ports layer.

pub mod inbound;
pub mod outbound;

pub use inbound::{ExtractedSignature, ExtractionOutcome, SignatureExtraction};
pub use outbound::SignatureMetadataRepository;
