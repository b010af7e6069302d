//! # Core Domain Entities
//!
//! Defines the identity types every validation component agrees on.
//!
//! ## Clusters
//!
//! - **Package Identity**: `PackageKey`
//! - **Validation Identity**: `ValidationRequest`, `ValidatorKind`

use crate::errors::ContractViolation;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// PACKAGE IDENTITY
// =============================================================================

/// Case-insensitive identity of one package version.
///
/// The id is lowercased and the version is normalized (lowercased, build
/// metadata stripped) so that `Foo 1.0.0+build` and `foo 1.0.0` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    /// Lowercased package id.
    pub id: String,
    /// Normalized package version.
    pub version: String,
}

impl PackageKey {
    /// Build a key from a raw id and version.
    pub fn new(package_id: &str, package_version: &str) -> Self {
        Self {
            id: package_id.trim().to_lowercase(),
            version: normalize_version(package_version),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.version)
    }
}

/// Normalize a package version string for identity comparisons.
fn normalize_version(version: &str) -> String {
    let trimmed = version.trim();
    let without_metadata = trimmed.split('+').next().unwrap_or(trimmed);
    without_metadata.to_lowercase()
}

// =============================================================================
// VALIDATOR IDENTITY
// =============================================================================

/// Discriminator for which validation logic owns a status row.
///
/// Several independent validators may track state for the same validation id;
/// each one reads and writes only the rows carrying its own kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatorKind(Cow<'static, str>);

impl ValidatorKind {
    /// The package signing validator.
    pub const PACKAGE_SIGNING: ValidatorKind =
        ValidatorKind(Cow::Borrowed("PackageSigningValidator"));

    /// Create a validator kind from an arbitrary name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The kind's name as stored in status keys.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// VALIDATION REQUEST
// =============================================================================

/// One validation attempt, as identified by the caller.
///
/// Immutable once created. This subsystem never persists the request itself;
/// `(validator kind, validation_id)` is the key into the status store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    validation_id: Uuid,
    package_id: String,
    package_version: String,
    content_url: String,
}

impl ValidationRequest {
    /// Create a request, rejecting empty required fields at the boundary.
    pub fn new(
        validation_id: Uuid,
        package_id: impl Into<String>,
        package_version: impl Into<String>,
        content_url: impl Into<String>,
    ) -> Result<Self, ContractViolation> {
        let package_id = package_id.into();
        let package_version = package_version.into();
        let content_url = content_url.into();

        if validation_id.is_nil() {
            return Err(ContractViolation::MissingField("validation_id"));
        }
        if package_id.trim().is_empty() {
            return Err(ContractViolation::MissingField("package_id"));
        }
        if package_version.trim().is_empty() {
            return Err(ContractViolation::MissingField("package_version"));
        }
        if content_url.trim().is_empty() {
            return Err(ContractViolation::MissingField("content_url"));
        }

        Ok(Self {
            validation_id,
            package_id,
            package_version,
            content_url,
        })
    }

    pub fn validation_id(&self) -> Uuid {
        self.validation_id
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn package_version(&self) -> &str {
        &self.package_version
    }

    /// Where the package bytes can be fetched from.
    pub fn content_url(&self) -> &str {
        &self.content_url
    }

    pub fn package_key(&self) -> PackageKey {
        PackageKey::new(&self.package_id, &self.package_version)
    }
}
