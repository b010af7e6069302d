//! # Outbound Ports
//!
//! Persistence for signature metadata.

use crate::domain::{ExtractionError, SignatureMetadata};
use shared_types::PackageKey;
use uuid::Uuid;

/// Write-once store of [`SignatureMetadata`] per validation.
pub trait SignatureMetadataRepository: Send + Sync {
    /// Persist the record unless one exists for the validation.
    ///
    /// Returns whether the record was written. An existing record is never
    /// modified.
    fn save(&self, metadata: &SignatureMetadata) -> Result<bool, ExtractionError>;

    fn get(&self, validation_id: Uuid) -> Result<Option<SignatureMetadata>, ExtractionError>;

    /// All records for a package, across validations.
    fn for_package(&self, package_key: &PackageKey) -> Result<Vec<SignatureMetadata>, ExtractionError>;
}
