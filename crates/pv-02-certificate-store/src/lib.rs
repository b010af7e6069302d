//! # Certificate Store (pv-02)
//!
//! Content-addressed storage for signing and timestamping certificates.
//! Certificates are shared across packages and stored exactly once, keyed by
//! the SHA-256 thumbprint of their encoded bytes. Writes are insert-if-absent,
//! so concurrent workers extracting the same chain need no locking.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{CertificateStoreError, PutOutcome, Thumbprint};
pub use ports::CertificateStore;
pub use service::{KvCertificateStore, CERTIFICATE_PREFIX};
