//! # Inbound Port
//!
//! The validator API exposed to orchestration callers.

use crate::domain::{OrchestratorError, ValidationResult};
use async_trait::async_trait;
use shared_types::ValidationRequest;

#[async_trait]
pub trait Validator: Send + Sync {
    /// Current result. A pure read.
    async fn get_result(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, OrchestratorError>;

    /// Start the validation. Idempotent: repeated and concurrent calls for the
    /// same validation id enqueue verification work at most once.
    async fn start_validation(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, OrchestratorError>;
}
