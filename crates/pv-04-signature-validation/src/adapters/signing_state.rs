//! Key-value backed package signing state.
//!
//! Key: `package-signing-state:{id}/{version}` → JSON record.

use crate::domain::{PackageSigningState, ValidatorError};
use crate::ports::outbound::PackageSigningStateStore;
use pv_01_validator_state::KeyValueStore;
use shared_types::PackageKey;
use std::sync::Arc;

const SIGNING_STATE_PREFIX: &str = "package-signing-state:";

fn state_key(package_key: &PackageKey) -> Vec<u8> {
    format!("{}{}", SIGNING_STATE_PREFIX, package_key).into_bytes()
}

pub struct KvPackageSigningStateStore<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> KvPackageSigningStateStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: KeyValueStore> PackageSigningStateStore for KvPackageSigningStateStore<S> {
    fn set(&self, state: &PackageSigningState) -> Result<(), ValidatorError> {
        let encoded = serde_json::to_vec(state)
            .map_err(|e| ValidatorError::SigningStateEncoding(e.to_string()))?;
        self.store.put(&state_key(&state.package_key), &encoded)?;
        Ok(())
    }

    fn get(&self, package_key: &PackageKey) -> Result<Option<PackageSigningState>, ValidatorError> {
        self.store
            .get(&state_key(package_key))?
            .map(|bytes| {
                serde_json::from_slice(&bytes)
                    .map_err(|e| ValidatorError::SigningStateEncoding(e.to_string()))
            })
            .transpose()
    }
}
