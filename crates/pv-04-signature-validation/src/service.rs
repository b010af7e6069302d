//! # Signature Validator
//!
//! Consumer-side pipeline for one verification message:
//!
//! 1. Re-read the status row; a terminal row short-circuits (duplicate guard)
//! 2. Download the package under a timeout
//! 3. Extract and persist signature parts
//! 4. Minimal verification (fail-fast)
//! 5. Full verification
//! 6. Record the package signing state, then `advance` the row
//!
//! Policy failures come back as a `Failed` outcome. Infrastructure failures
//! come back as errors and the message is redelivered.

use crate::domain::{
    PackageSigningState, PackageSigningStatus, ValidationOutcome, ValidationReport,
    ValidatorError, VerifyResult,
};
use crate::ports::inbound::SignatureValidation;
use crate::ports::outbound::{
    PackageContentSource, PackageSignatureVerifier, PackageSigningStateStore,
};
use async_trait::async_trait;
use pv_01_validator_state::{SystemTimeSource, TimeSource, ValidatorStateStore};
use pv_03_signature_extraction::{ExtractedSignature, ExtractionOutcome, SignatureExtraction};
use pv_telemetry::{log_validation_event, CERTIFICATES_STORED, VALIDATION_OUTCOMES};
use shared_types::{
    ContractViolation, IssueCode, PackageKey, SignatureValidationMessage, ValidationIssue,
    ValidationStatus, ValidatorKind,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default upper bound on one package download.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

pub struct SignatureValidator<St, E, P, G>
where
    St: ValidatorStateStore,
    E: SignatureExtraction,
    P: PackageContentSource,
    G: PackageSigningStateStore,
{
    state: Arc<St>,
    extractor: Arc<E>,
    content: Arc<P>,
    signing_state: Arc<G>,
    minimal: Arc<dyn PackageSignatureVerifier>,
    full: Arc<dyn PackageSignatureVerifier>,
    clock: Arc<dyn TimeSource>,
    validator_kind: ValidatorKind,
    download_timeout: Duration,
}

impl<St, E, P, G> SignatureValidator<St, E, P, G>
where
    St: ValidatorStateStore,
    E: SignatureExtraction,
    P: PackageContentSource,
    G: PackageSigningStateStore,
{
    pub fn new(
        state: Arc<St>,
        extractor: Arc<E>,
        content: Arc<P>,
        signing_state: Arc<G>,
        minimal: Arc<dyn PackageSignatureVerifier>,
        full: Arc<dyn PackageSignatureVerifier>,
    ) -> Self {
        Self {
            state,
            extractor,
            content,
            signing_state,
            minimal,
            full,
            clock: Arc::new(SystemTimeSource),
            validator_kind: ValidatorKind::PACKAGE_SIGNING,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Clock used for signing state timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_validator_kind(mut self, kind: ValidatorKind) -> Self {
        self.validator_kind = kind;
        self
    }

    pub fn validator_kind(&self) -> &ValidatorKind {
        &self.validator_kind
    }

    async fn download(
        &self,
        package_key: &PackageKey,
        content_url: &str,
    ) -> Result<Vec<u8>, ValidatorError> {
        tokio::time::timeout(
            self.download_timeout,
            self.content.fetch(package_key, content_url),
        )
        .await
        .map_err(|_| ValidatorError::DownloadTimeout(self.download_timeout))?
        .map_err(ValidatorError::from)
    }

    /// Minimal then full. Full never runs when minimal fails.
    fn verify(
        &self,
        package_key: &PackageKey,
        extracted: &ExtractedSignature,
    ) -> (ValidationOutcome, PackageSigningStatus) {
        if let VerifyResult::Invalid(issues) = self.minimal.verify(package_key, extracted) {
            debug!(
                package = %package_key,
                verifier = self.minimal.name(),
                issues = issues.len(),
                "Minimal verification failed, skipping full verification"
            );
            return (failed(issues), PackageSigningStatus::Invalid);
        }
        match self.full.verify(package_key, extracted) {
            VerifyResult::Valid => (ValidationOutcome::Succeeded, PackageSigningStatus::Valid),
            VerifyResult::Invalid(issues) => (failed(issues), PackageSigningStatus::Invalid),
        }
    }
}

/// `Failed` with at least one issue.
fn failed(mut issues: Vec<ValidationIssue>) -> ValidationOutcome {
    if issues.is_empty() {
        issues.push(ValidationIssue::new(
            IssueCode::Unknown,
            "verification failed without a reason",
        ));
    }
    ValidationOutcome::Failed(issues)
}

fn check_message(message: &SignatureValidationMessage) -> Result<(), ContractViolation> {
    if message.validation_id.is_nil() {
        return Err(ContractViolation::MissingField("validation_id"));
    }
    if message.package_id.trim().is_empty() {
        return Err(ContractViolation::MissingField("package_id"));
    }
    if message.package_version.trim().is_empty() {
        return Err(ContractViolation::MissingField("package_version"));
    }
    Ok(())
}

#[async_trait]
impl<St, E, P, G> SignatureValidation for SignatureValidator<St, E, P, G>
where
    St: ValidatorStateStore + 'static,
    E: SignatureExtraction + 'static,
    P: PackageContentSource + 'static,
    G: PackageSigningStateStore + 'static,
{
    async fn validate(
        &self,
        message: &SignatureValidationMessage,
    ) -> Result<ValidationReport, ValidatorError> {
        check_message(message)?;
        let validation_id = message.validation_id;

        let status = self
            .state
            .get_status(&self.validator_kind, validation_id)
            .await?;
        match status.state {
            ValidationStatus::NotStarted => return Err(ValidatorError::NotStarted(validation_id)),
            state if state.is_terminal() => {
                log_validation_event!(
                    warn,
                    "signature-validator",
                    "Validation already terminal, skipping message",
                    validation_id,
                    message.package_id,
                    message.package_version,
                    state = %state,
                    request_id = %message.request_id
                );
                return Ok(ValidationReport::AlreadyTerminal(state));
            }
            _ => {}
        }

        let package_key = message.package_key();
        let package = self.download(&package_key, &message.content_url).await?;

        let (outcome, signing_status) = match self
            .extractor
            .extract(validation_id, &package_key, &package)
            .await
        {
            Ok(ExtractionOutcome::Unsigned) => {
                (ValidationOutcome::Succeeded, PackageSigningStatus::Unsigned)
            }
            Ok(ExtractionOutcome::Signed(extracted)) => {
                CERTIFICATES_STORED.inc_by(extracted.certificates_stored as f64);
                self.verify(&package_key, &extracted)
            }
            Err(e) if e.is_permanent() => (
                failed(vec![ValidationIssue::new(
                    IssueCode::MalformedSignature,
                    e.to_string(),
                )]),
                PackageSigningStatus::Invalid,
            ),
            Err(e) => return Err(ValidatorError::Extraction(e)),
        };

        self.signing_state.set(&PackageSigningState {
            package_key: package_key.clone(),
            status: signing_status,
            validation_id,
            updated_at: self.clock.now(),
        })?;

        let (state, issues) = outcome.clone().into_parts();
        let advanced = self
            .state
            .advance(&self.validator_kind, validation_id, state, issues)
            .await?;

        if advanced {
            let state_label = state.to_string();
            VALIDATION_OUTCOMES
                .with_label_values(&[state_label.as_str(), outcome.issue_label()])
                .inc();
            log_validation_event!(
                info,
                "signature-validator",
                "Validation completed",
                validation_id,
                message.package_id,
                message.package_version,
                state = %state,
                issue = outcome.issue_label(),
                signing_status = %signing_status,
                request_id = %message.request_id
            );
        } else {
            warn!(
                validation_id = %validation_id,
                state = %state,
                "Another worker recorded the terminal state first"
            );
        }

        Ok(ValidationReport::Completed { outcome, advanced })
    }
}
