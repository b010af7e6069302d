//! Domain layer.

pub mod errors;
pub mod policy;
pub mod result;

pub use errors::{EnqueueError, OrchestratorError};
pub use policy::{FailedResultPolicy, SignedPackagesBlockedPolicy};
pub use result::ValidationResult;
