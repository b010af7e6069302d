//! # Validator State Store (pv-01)
//!
//! Durable status rows keyed by `(validator kind, validation id)`.
//!
//! ## Guarantees
//!
//! - **Insert-if-absent create:** exactly one concurrent `try_create` wins,
//!   which gates the single enqueue of verification work.
//! - **Forward-only advance:** terminal rows are never overwritten; a late or
//!   duplicate `advance` returns `false`.
//! - **No silent absence:** storage failures propagate as errors and are never
//!   read as `NotStarted`.
//!
//! All guarantees come from the storage-layer `compare_and_swap` primitive,
//! not from external locks.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     ┌────────────────────────┐     ┌───────────────┐
//! │ Orchestrator  │────▶│ KvValidatorStateStore  │────▶│ KeyValueStore │
//! │ / Workers     │     │ (CAS read-modify-write)│     │ memory / file │
//! └───────────────┘     └────────────────────────┘     └───────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{FileBackedKVStore, InMemoryKVStore, StoreLock};
pub use domain::{KVStoreError, StateStoreError};
pub use ports::{
    CreateOutcome, KeyValueStore, ScanResult, SystemTimeSource, TimeSource, ValidatorStateStore,
};
pub use service::{KvValidatorStateStore, DEFAULT_MAX_CAS_ATTEMPTS};
