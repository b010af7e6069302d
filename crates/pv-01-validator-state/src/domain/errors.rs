//! Error types for the validator state store.

use shared_types::ContractViolation;
use thiserror::Error;
use uuid::Uuid;

/// Key-value storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    /// Another process holds the store's lock.
    #[error("KV store locked: {message}")]
    Locked { message: String },
}

/// Errors from [`crate::ValidatorStateStore`] operations.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Underlying storage failed. Never interpreted as "row absent".
    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    /// A row exists but cannot be decoded.
    #[error("Corrupt status row {key}: {message}")]
    CorruptRow { key: String, message: String },

    /// `Advance` targeted a row that was never created.
    #[error("No status row for validator {kind}, validation {validation_id}")]
    RowNotFound { kind: String, validation_id: Uuid },

    /// The caller broke the operation's contract.
    #[error(transparent)]
    Contract(#[from] ContractViolation),

    /// Concurrent writers kept winning the compare-and-swap.
    #[error("Compare-and-swap retries exhausted for {key}")]
    Contention { key: String },
}

impl StateStoreError {
    /// Whether retrying the operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StateStoreError::Storage(KVStoreError::CorruptionError { .. }) => false,
            StateStoreError::Storage(_) | StateStoreError::Contention { .. } => true,
            // A row missing at advance time usually means the creator has not
            // committed yet from this reader's point of view.
            StateStoreError::RowNotFound { .. } => true,
            StateStoreError::CorruptRow { .. } | StateStoreError::Contract(_) => false,
        }
    }
}
