//! # Validator Status
//!
//! The persisted state machine record for one `(validator kind, validation id)`.
//!
//! ## State Machine
//!
//! ```text
//! [NotStarted] ──start──→ [Incomplete] ──verify ok──→ [Succeeded]
//!                              │
//!                              └──policy violation──→ [Failed(issues)]
//! ```
//!
//! Rows only move forward. `Succeeded` and `Failed` are terminal.

use crate::entities::{PackageKey, ValidatorKind};
use crate::issues::ValidationIssue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a validation as seen by one validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// No row exists yet.
    NotStarted,
    /// Verification has been requested and is in progress.
    Incomplete,
    /// Terminal: the package passed validation.
    Succeeded,
    /// Terminal: the package failed validation.
    Failed,
}

impl ValidationStatus {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ValidationStatus::Succeeded | ValidationStatus::Failed)
    }

    /// Whether the state machine permits `self → next`.
    #[must_use]
    pub fn can_advance_to(self, next: ValidationStatus) -> bool {
        match (self, next) {
            (ValidationStatus::NotStarted, ValidationStatus::Incomplete) => true,
            (ValidationStatus::NotStarted, n) | (ValidationStatus::Incomplete, n) => {
                n.is_terminal()
            }
            _ => false,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationStatus::NotStarted => "NotStarted",
            ValidationStatus::Incomplete => "Incomplete",
            ValidationStatus::Succeeded => "Succeeded",
            ValidationStatus::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Persisted status row.
///
/// A row that does not exist is represented by `ValidatorStatus::not_started`
/// rather than an error, so reads never fail on absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorStatus {
    pub validation_id: Uuid,
    pub validator_kind: ValidatorKind,
    /// Package this validation concerns (absent only for `NotStarted`).
    pub package_key: Option<PackageKey>,
    pub state: ValidationStatus,
    /// Non-empty only when `state == Failed`.
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// When the verification message was handed to the queue.
    #[serde(default)]
    pub enqueued_at: Option<DateTime<Utc>>,
}

impl ValidatorStatus {
    /// The default value returned for a missing row.
    pub fn not_started(validator_kind: ValidatorKind, validation_id: Uuid) -> Self {
        Self {
            validation_id,
            validator_kind,
            package_key: None,
            state: ValidationStatus::NotStarted,
            issues: Vec::new(),
            created_at: None,
            updated_at: None,
            enqueued_at: None,
        }
    }

    /// Whether the row's state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
