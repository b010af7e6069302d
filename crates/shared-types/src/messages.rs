//! # Queue Messages
//!
//! The verification trigger published by the orchestrator and consumed by the
//! extraction/verification workers. The schema must stay readable across
//! producer and consumer versions: new fields get serde defaults, unknown
//! fields are ignored.

use crate::entities::{PackageKey, ValidationRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message asking a worker to extract and verify a package signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureValidationMessage {
    pub validation_id: Uuid,
    pub package_id: String,
    pub package_version: String,
    /// Where the package bytes can be fetched from.
    #[serde(default)]
    pub content_url: String,
    /// Correlation id for tracing one start request through the pipeline.
    #[serde(default = "Uuid::nil")]
    pub request_id: Uuid,
}

impl SignatureValidationMessage {
    /// Schema name carried in the message envelope.
    pub const SCHEMA_NAME: &'static str = "SignatureValidationMessageData";

    /// Current schema version.
    pub const SCHEMA_VERSION: u32 = 1;

    /// Build the message for a validation request.
    pub fn from_request(request: &ValidationRequest, request_id: Uuid) -> Self {
        Self {
            validation_id: request.validation_id(),
            package_id: request.package_id().to_string(),
            package_version: request.package_version().to_string(),
            content_url: request.content_url().to_string(),
            request_id,
        }
    }

    pub fn package_key(&self) -> PackageKey {
        PackageKey::new(&self.package_id, &self.package_version)
    }
}
