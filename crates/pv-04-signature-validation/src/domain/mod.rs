//! Domain layer.

pub mod chain;
pub mod errors;
pub mod outcome;
pub mod policy;

pub use errors::{ContentSourceError, ValidatorError};
pub use outcome::{
    PackageSigningState, PackageSigningStatus, ValidationOutcome, ValidationReport, VerifyResult,
};
pub use policy::{SigningPolicy, TrustStore};
