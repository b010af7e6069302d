//! # Package Signing Orchestrator (pv-05)
//!
//! The `GetResult` / `StartValidation` surface for package signing.
//!
//! ## Start Protocol
//!
//! 1. Read the status row; an existing row makes the start a no-op
//! 2. `try_create(Incomplete)`; only the creator continues
//! 3. Enqueue the verification message (row first, message second)
//! 4. `mark_enqueued`
//!
//! ## Failed Results
//!
//! A `Failed` row always reports at least one issue. When the worker recorded
//! none, [`SignedPackagesBlockedPolicy`] supplies "package is signed".

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::QueueVerificationEnqueuer;
pub use domain::{
    EnqueueError, FailedResultPolicy, OrchestratorError, SignedPackagesBlockedPolicy,
    ValidationResult,
};
pub use ports::{Validator, VerificationEnqueuer};
pub use service::{PackageSigningValidator, DEFAULT_ENQUEUE_CLAIM_TIMEOUT};
