//! # Error Types
//!
//! Defines error types used across components.

use crate::status::ValidationStatus;
use thiserror::Error;

/// A caller broke the contract of a component boundary.
///
/// These are programming errors: they fail fast and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// A required field was empty or nil.
    #[error("Required field is missing: {0}")]
    MissingField(&'static str),

    /// A status row cannot be created in this state.
    #[error("Cannot create a status row in state {0}")]
    InvalidInitialState(ValidationStatus),

    /// Issues may only accompany a `Failed` status.
    #[error("Issues cannot be attached to state {0}")]
    IssuesOnNonFailedState(ValidationStatus),
}
