//! # Validation Issues
//!
//! Structured, user-facing reasons attached to a terminal `Failed` status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Machine-readable reason code for a failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    /// Failure with no more specific classification.
    Unknown,
    /// The package is signed but signed packages are not accepted.
    PackageIsSigned,
    /// The signature block or an embedded certificate could not be decoded.
    MalformedSignature,
    /// The signature type is not accepted (e.g. a repository primary signature).
    UnsupportedSignatureType,
    /// The signed digest does not match the package content.
    ContentHashMismatch,
    /// The signature does not verify against the signing certificate.
    SignatureInvalid,
    /// A certificate in the chain was not valid at signing time.
    CertificateExpired,
    /// The certificate chain does not end at a trusted root.
    UntrustedChain,
    /// The timestamp token is invalid or untrusted.
    TimestampInvalid,
}

impl IssueCode {
    /// Stable label used for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::Unknown => "unknown",
            IssueCode::PackageIsSigned => "package_is_signed",
            IssueCode::MalformedSignature => "malformed_signature",
            IssueCode::UnsupportedSignatureType => "unsupported_signature_type",
            IssueCode::ContentHashMismatch => "content_hash_mismatch",
            IssueCode::SignatureInvalid => "signature_invalid",
            IssueCode::CertificateExpired => "certificate_expired",
            IssueCode::UntrustedChain => "untrusted_chain",
            IssueCode::TimestampInvalid => "timestamp_invalid",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single issue: code, human message and structured data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: BTreeMap::new(),
        }
    }

    /// Attach a structured data field.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// "Package is signed" for the given package.
    pub fn package_is_signed(package_id: &str, package_version: &str) -> Self {
        Self::new(
            IssueCode::PackageIsSigned,
            format!("Package {package_id} {package_version} is signed, and signed packages are not accepted"),
        )
        .with_data("package_id", package_id)
        .with_data("package_version", package_version)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: Package-is-signed issue carries the package identity
    #[test]
    fn test_package_is_signed_issue() {
        let issue = ValidationIssue::package_is_signed("Foo", "1.0.0");
        assert_eq!(issue.code, IssueCode::PackageIsSigned);
        assert_eq!(issue.data.get("package_id").map(String::as_str), Some("Foo"));
        assert_eq!(
            issue.data.get("package_version").map(String::as_str),
            Some("1.0.0")
        );
    }

    /// Test: Issues without data omit the field on the wire
    #[test]
    fn test_issue_serialization_is_stable() {
        let issue = ValidationIssue::new(IssueCode::UntrustedChain, "chain untrusted");
        let json = serde_json::to_string(&issue).unwrap();
        assert_eq!(
            json,
            r#"{"code":"UntrustedChain","message":"chain untrusted"}"#
        );
        let back: ValidationIssue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, issue);
    }
}
