//! Validator errors.

use pv_01_validator_state::{KVStoreError, StateStoreError};
use pv_03_signature_extraction::ExtractionError;
use shared_types::ContractViolation;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Failure fetching package bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentSourceError {
    #[error("Package content not found: {0}")]
    NotFound(String),

    #[error("Package content I/O error: {0}")]
    Io(String),
}

/// Errors from handling a verification message.
///
/// Policy failures never appear here; they are outcomes.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    /// The status row does not exist (yet).
    #[error("Validation {0} has not been started")]
    NotStarted(Uuid),

    #[error("Package download failed: {0}")]
    Download(#[from] ContentSourceError),

    #[error("Package download timed out after {0:?}")]
    DownloadTimeout(Duration),

    #[error("Extraction failed: {0}")]
    Extraction(ExtractionError),

    #[error("Signing state store error: {0}")]
    SigningState(#[from] KVStoreError),

    #[error("Signing state encoding error: {0}")]
    SigningStateEncoding(String),

    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

impl ValidatorError {
    /// Whether redelivery may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ValidatorError::State(e) => e.is_transient(),
            ValidatorError::NotStarted(_)
            | ValidatorError::Download(_)
            | ValidatorError::DownloadTimeout(_)
            | ValidatorError::SigningState(_) => true,
            ValidatorError::Extraction(e) => !e.is_permanent(),
            ValidatorError::SigningStateEncoding(_) | ValidatorError::Contract(_) => false,
        }
    }
}
