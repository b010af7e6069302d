//! Ports layer.

pub mod inbound;
pub mod outbound;

pub use inbound::SignatureValidation;
pub use outbound::{PackageContentSource, PackageSignatureVerifier, PackageSigningStateStore};
