//! Orchestrator errors.

use pv_01_validator_state::StateStoreError;
use shared_bus::{QueueError, SerializationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Message serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

impl EnqueueError {
    pub fn is_transient(&self) -> bool {
        match self {
            EnqueueError::Queue(e) => e.is_transient(),
            EnqueueError::Serialization(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Failed to enqueue verification: {0}")]
    Enqueue(#[from] EnqueueError),
}

impl OrchestratorError {
    /// Whether the caller should retry the same request.
    pub fn is_transient(&self) -> bool {
        match self {
            OrchestratorError::State(e) => e.is_transient(),
            OrchestratorError::Enqueue(e) => e.is_transient(),
        }
    }
}
