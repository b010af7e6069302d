//! # Status Transitions
//!
//! Pure decisions about status rows. The service applies them with
//! compare-and-swap writes; nothing here touches storage.

use chrono::{DateTime, Utc};
use shared_types::{
    ContractViolation, PackageKey, ValidationIssue, ValidationStatus, ValidatorKind,
    ValidatorStatus,
};
use uuid::Uuid;

/// Result of planning an `Advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceDecision {
    /// Write this row.
    Apply(ValidatorStatus),
    /// The row is terminal. Nothing to write.
    AlreadyTerminal,
    /// The state machine does not allow the transition.
    NotPermitted,
}

/// Build the row written by `TryCreate`.
pub fn new_row(
    kind: &ValidatorKind,
    validation_id: Uuid,
    package_key: &PackageKey,
    initial: ValidationStatus,
    now: DateTime<Utc>,
) -> Result<ValidatorStatus, ContractViolation> {
    if initial == ValidationStatus::NotStarted {
        return Err(ContractViolation::InvalidInitialState(initial));
    }
    if validation_id.is_nil() {
        return Err(ContractViolation::MissingField("validation_id"));
    }

    Ok(ValidatorStatus {
        validation_id,
        validator_kind: kind.clone(),
        package_key: Some(package_key.clone()),
        state: initial,
        issues: Vec::new(),
        created_at: Some(now),
        updated_at: Some(now),
        enqueued_at: None,
    })
}

/// Reject issues on anything but `Failed`.
pub fn check_issues(
    new_state: ValidationStatus,
    issues: &[ValidationIssue],
) -> Result<(), ContractViolation> {
    if !issues.is_empty() && new_state != ValidationStatus::Failed {
        return Err(ContractViolation::IssuesOnNonFailedState(new_state));
    }
    Ok(())
}

/// Decide what `Advance(new_state, issues)` does to `current`.
pub fn plan_advance(
    current: &ValidatorStatus,
    new_state: ValidationStatus,
    issues: Vec<ValidationIssue>,
    now: DateTime<Utc>,
) -> Result<AdvanceDecision, ContractViolation> {
    check_issues(new_state, &issues)?;

    if current.is_terminal() {
        return Ok(AdvanceDecision::AlreadyTerminal);
    }
    if !current.state.can_advance_to(new_state) {
        return Ok(AdvanceDecision::NotPermitted);
    }

    let mut next = current.clone();
    next.state = new_state;
    next.issues = issues;
    next.updated_at = Some(now);
    Ok(AdvanceDecision::Apply(next))
}

/// Row with `enqueued_at` recorded, or `None` if already recorded or the row
/// is terminal.
pub fn plan_mark_enqueued(current: &ValidatorStatus, now: DateTime<Utc>) -> Option<ValidatorStatus> {
    if current.is_terminal() || current.enqueued_at.is_some() {
        return None;
    }
    let mut next = current.clone();
    next.enqueued_at = Some(now);
    Some(next)
}

/// Row that claims a stalled enqueue, or `None` if the row is not claimable.
///
/// A row is claimable when it is `Incomplete`, its message was never
/// recorded as enqueued, and nobody touched it for `stale_after`. Claiming
/// bumps `updated_at`, which makes the row unclaimable for everyone else.
pub fn plan_claim_enqueue(
    current: &ValidatorStatus,
    stale_after: chrono::Duration,
    now: DateTime<Utc>,
) -> Option<ValidatorStatus> {
    if current.state != ValidationStatus::Incomplete || current.enqueued_at.is_some() {
        return None;
    }
    let last_touched = current.updated_at.or(current.created_at)?;
    if now - last_touched < stale_after {
        return None;
    }
    let mut next = current.clone();
    next.updated_at = Some(now);
    Some(next)
}
