//! Adapters layer.

pub mod content_source;
pub mod signing_state;
pub mod verifiers;

pub use content_source::InMemoryPackageContentSource;
pub use signing_state::KvPackageSigningStateStore;
pub use verifiers::{FullPackageSignatureVerifier, MinimalPackageSignatureVerifier};
