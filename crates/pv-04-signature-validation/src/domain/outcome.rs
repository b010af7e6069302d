//! Validation outcomes and per-package signing state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{IssueCode, PackageKey, ValidationIssue, ValidationStatus};
use std::fmt;
use uuid::Uuid;

/// Result of one verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid,
    Invalid(Vec<ValidationIssue>),
}

impl VerifyResult {
    pub fn invalid(issue: ValidationIssue) -> Self {
        VerifyResult::Invalid(vec![issue])
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid)
    }
}

/// Terminal outcome decided by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Succeeded,
    Failed(Vec<ValidationIssue>),
}

impl ValidationOutcome {
    pub fn state(&self) -> ValidationStatus {
        match self {
            ValidationOutcome::Succeeded => ValidationStatus::Succeeded,
            ValidationOutcome::Failed(_) => ValidationStatus::Failed,
        }
    }

    /// Label for the outcome metric: first issue code or `none`.
    pub fn issue_label(&self) -> &'static str {
        match self {
            ValidationOutcome::Succeeded => "none",
            ValidationOutcome::Failed(issues) => issues
                .first()
                .map(|i| i.code.as_str())
                .unwrap_or(IssueCode::Unknown.as_str()),
        }
    }

    pub fn into_parts(self) -> (ValidationStatus, Vec<ValidationIssue>) {
        match self {
            ValidationOutcome::Succeeded => (ValidationStatus::Succeeded, Vec::new()),
            ValidationOutcome::Failed(issues) => (ValidationStatus::Failed, issues),
        }
    }
}

/// What handling one verification message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReport {
    /// The row was already terminal; nothing was re-done.
    AlreadyTerminal(ValidationStatus),
    /// The pipeline ran to an outcome.
    Completed {
        outcome: ValidationOutcome,
        /// `false` when another worker recorded a terminal state first.
        advanced: bool,
    },
}

/// Per-package signing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageSigningStatus {
    Unsigned,
    Valid,
    Invalid,
}

impl fmt::Display for PackageSigningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageSigningStatus::Unsigned => "Unsigned",
            PackageSigningStatus::Valid => "Valid",
            PackageSigningStatus::Invalid => "Invalid",
        };
        f.write_str(name)
    }
}

/// Persisted signing state of a package. Last writer wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSigningState {
    pub package_key: PackageKey,
    pub status: PackageSigningStatus,
    /// Validation that produced this state.
    pub validation_id: Uuid,
    pub updated_at: DateTime<Utc>,
}
