//! Domain layer: key layout, transition rules and errors.

pub mod errors;
pub mod keys;
pub mod transitions;

pub use errors::{KVStoreError, StateStoreError};
pub use keys::{kind_prefix, status_key, STATUS_PREFIX};
pub use transitions::AdvanceDecision;
