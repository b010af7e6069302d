//! # Package Signing Validator
//!
//! Orchestrator-side state machine:
//!
//! ```text
//! NotStarted ──start_validation──▶ Incomplete ──worker──▶ Succeeded | Failed
//! ```
//!
//! `start_validation` persists the `Incomplete` row with an insert-if-absent
//! and only the caller that created the row enqueues. The row exists before
//! the message does, so a fast worker never reads `NotStarted`.
//!
//! If the creator dies between create and enqueue, the row stays `Incomplete`
//! without `enqueued_at`. A later start observing such a row after
//! `enqueue_claim_timeout` claims it through the store and re-enqueues.

use crate::domain::{
    FailedResultPolicy, OrchestratorError, SignedPackagesBlockedPolicy, ValidationResult,
};
use crate::ports::inbound::Validator;
use crate::ports::outbound::VerificationEnqueuer;
use async_trait::async_trait;
use pv_01_validator_state::ValidatorStateStore;
use pv_telemetry::{log_validation_event, DUPLICATE_STARTS, VALIDATIONS_STARTED};
use shared_types::{ValidationRequest, ValidationStatus, ValidatorKind, ValidatorStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use uuid::Uuid;

/// Default age after which an unmarked `Incomplete` row may be re-enqueued.
pub const DEFAULT_ENQUEUE_CLAIM_TIMEOUT: Duration = Duration::from_secs(300);

pub struct PackageSigningValidator<St, E>
where
    St: ValidatorStateStore,
    E: VerificationEnqueuer,
{
    state: Arc<St>,
    enqueuer: Arc<E>,
    failure_policy: Arc<dyn FailedResultPolicy>,
    validator_kind: ValidatorKind,
    enqueue_claim_timeout: Duration,
}

impl<St, E> PackageSigningValidator<St, E>
where
    St: ValidatorStateStore,
    E: VerificationEnqueuer,
{
    pub fn new(state: Arc<St>, enqueuer: Arc<E>) -> Self {
        Self {
            state,
            enqueuer,
            failure_policy: Arc::new(SignedPackagesBlockedPolicy),
            validator_kind: ValidatorKind::PACKAGE_SIGNING,
            enqueue_claim_timeout: DEFAULT_ENQUEUE_CLAIM_TIMEOUT,
        }
    }

    pub fn with_failure_policy(mut self, policy: Arc<dyn FailedResultPolicy>) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_enqueue_claim_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_claim_timeout = timeout;
        self
    }

    pub fn with_validator_kind(mut self, kind: ValidatorKind) -> Self {
        self.validator_kind = kind;
        self
    }

    /// Enqueue, then record that the message reached the queue.
    async fn enqueue(
        &self,
        request: &ValidationRequest,
        request_id: Uuid,
    ) -> Result<(), OrchestratorError> {
        if let Err(e) = self.enqueuer.enqueue_verification(request, request_id).await {
            error!(
                validation_id = %request.validation_id(),
                request_id = %request_id,
                error = %e,
                "Failed to enqueue verification, row left for enqueue recovery"
            );
            return Err(e.into());
        }
        self.state
            .mark_enqueued(&self.validator_kind, request.validation_id())
            .await?;
        Ok(())
    }

    /// Existing row: recover a stalled enqueue if this caller can claim it.
    async fn on_existing(
        &self,
        request: &ValidationRequest,
        existing: &ValidatorStatus,
        request_id: Uuid,
    ) -> Result<ValidationResult, OrchestratorError> {
        let stalled =
            existing.state == ValidationStatus::Incomplete && existing.enqueued_at.is_none();
        if stalled
            && self
                .state
                .claim_enqueue(
                    &self.validator_kind,
                    request.validation_id(),
                    self.enqueue_claim_timeout,
                )
                .await?
        {
            self.enqueue(request, request_id).await?;
            log_validation_event!(
                warn,
                "package-signing-validator",
                "Re-enqueued stalled verification",
                request.validation_id(),
                request.package_id(),
                request.package_version(),
                request_id = %request_id
            );
            return Ok(ValidationResult::new(ValidationStatus::Incomplete));
        }

        DUPLICATE_STARTS.inc();
        log_validation_event!(
            warn,
            "package-signing-validator",
            "Package signing validation has already started",
            request.validation_id(),
            request.package_id(),
            request.package_version(),
            state = %existing.state
        );
        Ok(ValidationResult::new(existing.state))
    }
}

#[async_trait]
impl<St, E> Validator for PackageSigningValidator<St, E>
where
    St: ValidatorStateStore + 'static,
    E: VerificationEnqueuer + 'static,
{
    async fn get_result(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, OrchestratorError> {
        let status = self
            .state
            .get_status(&self.validator_kind, request.validation_id())
            .await?;

        if status.state == ValidationStatus::Failed {
            let issues = self.failure_policy.issues_for(request, status.issues);
            return Ok(ValidationResult::failed_with_issues(issues));
        }
        Ok(ValidationResult::new(status.state))
    }

    async fn start_validation(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, OrchestratorError> {
        let request_id = Uuid::new_v4();
        let validation_id = request.validation_id();

        let current = self
            .state
            .get_status(&self.validator_kind, validation_id)
            .await?;
        if current.state != ValidationStatus::NotStarted {
            return self.on_existing(request, &current, request_id).await;
        }

        let created = self
            .state
            .try_create(
                &self.validator_kind,
                validation_id,
                &request.package_key(),
                ValidationStatus::Incomplete,
            )
            .await?;
        if !created.created {
            // Another caller created the row between our read and write
            return self.on_existing(request, &created.status, request_id).await;
        }

        self.enqueue(request, request_id).await?;

        VALIDATIONS_STARTED.inc();
        log_validation_event!(
            info,
            "package-signing-validator",
            "Started package signing validation",
            validation_id,
            request.package_id(),
            request.package_version(),
            request_id = %request_id
        );
        Ok(ValidationResult::new(ValidationStatus::Incomplete))
    }
}
