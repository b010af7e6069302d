//! # Failed-Result Policy
//!
//! Decides which issues a caller sees for a `Failed` row. Validators that only
//! recorded the failure, not its cause, still owe the caller a reason.

use shared_types::{ValidationIssue, ValidationRequest};

pub trait FailedResultPolicy: Send + Sync {
    /// Issues reported for a failed validation. Never empty.
    fn issues_for(
        &self,
        request: &ValidationRequest,
        recorded: Vec<ValidationIssue>,
    ) -> Vec<ValidationIssue>;
}

/// A failure without recorded issues means signed packages are blocked.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedPackagesBlockedPolicy;

impl FailedResultPolicy for SignedPackagesBlockedPolicy {
    fn issues_for(
        &self,
        request: &ValidationRequest,
        recorded: Vec<ValidationIssue>,
    ) -> Vec<ValidationIssue> {
        if !recorded.is_empty() {
            return recorded;
        }
        vec![ValidationIssue::package_is_signed(
            request.package_id(),
            request.package_version(),
        )]
    }
}
