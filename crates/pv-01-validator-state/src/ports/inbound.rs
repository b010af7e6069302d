//! # Inbound Ports (Driving Ports / API)
//!
//! The state store API used by the orchestrator and the verification workers.

use crate::domain::errors::StateStoreError;
use async_trait::async_trait;
use shared_types::{PackageKey, ValidationIssue, ValidationStatus, ValidatorKind, ValidatorStatus};
use std::time::Duration;
use uuid::Uuid;

/// Outcome of [`ValidatorStateStore::try_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    /// The row as persisted: the new one, or the pre-existing one.
    pub status: ValidatorStatus,
    /// Whether this call inserted the row.
    pub created: bool,
}

/// Durable status rows keyed by `(validator kind, validation id)`.
///
/// All coordination between orchestrators and workers goes through the
/// atomic create/advance operations of this store.
#[async_trait]
pub trait ValidatorStateStore: Send + Sync {
    /// Current row, or `ValidatorStatus::not_started` when absent.
    ///
    /// Storage failures are errors, never a synthesized `NotStarted`.
    async fn get_status(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
    ) -> Result<ValidatorStatus, StateStoreError>;

    /// Insert the row if absent.
    ///
    /// Exactly one concurrent caller observes `created == true`; that caller
    /// owns the enqueue.
    async fn try_create(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
        package_key: &PackageKey,
        initial: ValidationStatus,
    ) -> Result<CreateOutcome, StateStoreError>;

    /// Move the row forward.
    ///
    /// Returns `false` without writing when the row is already terminal or the
    /// transition is not permitted. Errors when the row does not exist or when
    /// issues accompany a non-`Failed` state.
    async fn advance(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
        new_state: ValidationStatus,
        issues: Vec<ValidationIssue>,
    ) -> Result<bool, StateStoreError>;

    /// Record that the verification message reached the queue.
    async fn mark_enqueued(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
    ) -> Result<bool, StateStoreError>;

    /// Claim a stalled enqueue: the row is `Incomplete`, was never marked
    /// enqueued and has not been touched for `stale_after`.
    ///
    /// At most one concurrent caller wins. The winner re-enqueues.
    async fn claim_enqueue(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
        stale_after: Duration,
    ) -> Result<bool, StateStoreError>;
}
