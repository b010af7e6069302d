//! # Validator State Service
//!
//! [`ValidatorStateStore`] over any [`KeyValueStore`]. Every write is a
//! compare-and-swap against the bytes last read, retried a bounded number of
//! times when another writer got there first.

use crate::domain::errors::StateStoreError;
use crate::domain::keys::status_key;
use crate::domain::transitions::{
    check_issues, new_row, plan_advance, plan_claim_enqueue, plan_mark_enqueued, AdvanceDecision,
};
use crate::ports::inbound::{CreateOutcome, ValidatorStateStore};
use crate::ports::outbound::{KeyValueStore, SystemTimeSource, TimeSource};
use async_trait::async_trait;
use shared_types::{PackageKey, ValidationIssue, ValidationStatus, ValidatorKind, ValidatorStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default number of compare-and-swap attempts per operation.
pub const DEFAULT_MAX_CAS_ATTEMPTS: usize = 16;

/// Key-value backed validator state store.
pub struct KvValidatorStateStore<S: KeyValueStore> {
    store: Arc<S>,
    clock: Arc<dyn TimeSource>,
    max_cas_attempts: usize,
}

impl<S: KeyValueStore> KvValidatorStateStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemTimeSource),
            max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
        }
    }

    /// Use a custom clock.
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_max_cas_attempts(mut self, attempts: usize) -> Self {
        self.max_cas_attempts = attempts.max(1);
        self
    }

    /// Every row of one validator kind. Intended for operators and tests.
    pub fn rows_for_kind(&self, kind: &ValidatorKind) -> Result<Vec<ValidatorStatus>, StateStoreError> {
        self.store
            .prefix_scan(&crate::domain::keys::kind_prefix(kind))?
            .into_iter()
            .map(|(key, raw)| decode(&key, &raw))
            .collect()
    }

    fn read_row(&self, key: &[u8]) -> Result<Option<(Vec<u8>, ValidatorStatus)>, StateStoreError> {
        match self.store.get(key)? {
            Some(raw) => {
                let status = decode(key, &raw)?;
                Ok(Some((raw, status)))
            }
            None => Ok(None),
        }
    }

    /// Read-modify-CAS loop for an existing row. `plan` returns the new row or
    /// `None` to stop without writing.
    fn update_row<F>(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
        mut plan: F,
    ) -> Result<bool, StateStoreError>
    where
        F: FnMut(&ValidatorStatus) -> Result<Option<ValidatorStatus>, StateStoreError>,
    {
        let key = status_key(kind, validation_id);
        for attempt in 0..self.max_cas_attempts {
            let (raw, current) =
                self.read_row(&key)?
                    .ok_or_else(|| StateStoreError::RowNotFound {
                        kind: kind.to_string(),
                        validation_id,
                    })?;

            let next = match plan(&current)? {
                Some(next) => next,
                None => return Ok(false),
            };

            if self
                .store
                .compare_and_swap(&key, Some(&raw), &encode(&next)?)?
            {
                return Ok(true);
            }
            debug!(validation_id = %validation_id, attempt, "Status row changed concurrently, retrying");
        }

        Err(StateStoreError::Contention {
            key: String::from_utf8_lossy(&key).into_owned(),
        })
    }
}

fn encode(status: &ValidatorStatus) -> Result<Vec<u8>, StateStoreError> {
    serde_json::to_vec(status).map_err(|e| StateStoreError::CorruptRow {
        key: format!("{}:{}", status.validator_kind, status.validation_id),
        message: e.to_string(),
    })
}

fn decode(key: &[u8], raw: &[u8]) -> Result<ValidatorStatus, StateStoreError> {
    serde_json::from_slice(raw).map_err(|e| StateStoreError::CorruptRow {
        key: String::from_utf8_lossy(key).into_owned(),
        message: e.to_string(),
    })
}

#[async_trait]
impl<S: KeyValueStore + 'static> ValidatorStateStore for KvValidatorStateStore<S> {
    async fn get_status(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
    ) -> Result<ValidatorStatus, StateStoreError> {
        let key = status_key(kind, validation_id);
        Ok(self
            .read_row(&key)?
            .map(|(_, status)| status)
            .unwrap_or_else(|| ValidatorStatus::not_started(kind.clone(), validation_id)))
    }

    async fn try_create(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
        package_key: &PackageKey,
        initial: ValidationStatus,
    ) -> Result<CreateOutcome, StateStoreError> {
        let row = new_row(kind, validation_id, package_key, initial, self.clock.now())?;
        let encoded = encode(&row)?;
        let key = status_key(kind, validation_id);

        for _ in 0..self.max_cas_attempts {
            if self.store.compare_and_swap(&key, None, &encoded)? {
                info!(
                    validation_id = %validation_id,
                    validator = %kind,
                    state = %initial,
                    "Created validator status"
                );
                return Ok(CreateOutcome {
                    status: row,
                    created: true,
                });
            }

            // Lost the race: report the winner's row. It can only vanish
            // again through an external delete, in which case retry.
            if let Some((_, existing)) = self.read_row(&key)? {
                debug!(
                    validation_id = %validation_id,
                    state = %existing.state,
                    "Validator status already exists"
                );
                return Ok(CreateOutcome {
                    status: existing,
                    created: false,
                });
            }
        }

        Err(StateStoreError::Contention {
            key: String::from_utf8_lossy(&key).into_owned(),
        })
    }

    async fn advance(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
        new_state: ValidationStatus,
        issues: Vec<ValidationIssue>,
    ) -> Result<bool, StateStoreError> {
        check_issues(new_state, &issues)?;
        let now = self.clock.now();

        let advanced = self.update_row(kind, validation_id, |current| {
            match plan_advance(current, new_state, issues.clone(), now)? {
                AdvanceDecision::Apply(next) => Ok(Some(next)),
                AdvanceDecision::AlreadyTerminal => {
                    debug!(
                        validation_id = %validation_id,
                        current = %current.state,
                        requested = %new_state,
                        "Status already terminal, advance ignored"
                    );
                    Ok(None)
                }
                AdvanceDecision::NotPermitted => {
                    warn!(
                        validation_id = %validation_id,
                        current = %current.state,
                        requested = %new_state,
                        "Transition not permitted"
                    );
                    Ok(None)
                }
            }
        })?;

        if advanced {
            info!(
                validation_id = %validation_id,
                validator = %kind,
                state = %new_state,
                issues = issues.len(),
                "Advanced validator status"
            );
        }
        Ok(advanced)
    }

    async fn mark_enqueued(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
    ) -> Result<bool, StateStoreError> {
        let now = self.clock.now();
        self.update_row(kind, validation_id, |current| {
            Ok(plan_mark_enqueued(current, now))
        })
    }

    async fn claim_enqueue(
        &self,
        kind: &ValidatorKind,
        validation_id: Uuid,
        stale_after: Duration,
    ) -> Result<bool, StateStoreError> {
        let stale_after =
            chrono::Duration::from_std(stale_after).unwrap_or_else(|_| chrono::Duration::days(3650));
        let now = self.clock.now();

        let claimed = self.update_row(kind, validation_id, |current| {
            Ok(plan_claim_enqueue(current, stale_after, now))
        })?;
        if claimed {
            warn!(validation_id = %validation_id, "Claimed stalled enqueue");
        }
        Ok(claimed)
    }
}
