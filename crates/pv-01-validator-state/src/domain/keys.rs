//! Storage key layout.
//!
//! `validator-status:{kind}:{validation_id}`

use shared_types::ValidatorKind;
use uuid::Uuid;

/// Prefix shared by all status rows.
pub const STATUS_PREFIX: &str = "validator-status:";

/// Key of the status row for `(kind, validation_id)`.
pub fn status_key(kind: &ValidatorKind, validation_id: Uuid) -> Vec<u8> {
    format!("{}{}:{}", STATUS_PREFIX, kind.as_str(), validation_id).into_bytes()
}

/// Prefix of every status row owned by `kind`.
pub fn kind_prefix(kind: &ValidatorKind) -> Vec<u8> {
    format!("{}{}:", STATUS_PREFIX, kind.as_str()).into_bytes()
}
