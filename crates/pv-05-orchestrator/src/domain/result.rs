//! Result returned to orchestration callers.

use shared_types::{ValidationIssue, ValidationStatus};

/// Validation state plus the issues explaining a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    /// Non-empty exactly when `status` is `Failed`.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Result without issues. Use [`ValidationResult::failed_with_issues`]
    /// for failures.
    pub fn new(status: ValidationStatus) -> Self {
        Self {
            status,
            issues: Vec::new(),
        }
    }

    pub fn failed_with_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            issues,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
