//! # Inbound Port
//!
//! Consumer-side validation API driven by the message handler.

use crate::domain::{ValidationReport, ValidatorError};
use async_trait::async_trait;
use shared_types::SignatureValidationMessage;

#[async_trait]
pub trait SignatureValidation: Send + Sync {
    /// Run the extraction/verification pipeline for one message.
    ///
    /// Safe to call repeatedly for the same message.
    async fn validate(
        &self,
        message: &SignatureValidationMessage,
    ) -> Result<ValidationReport, ValidatorError>;
}
