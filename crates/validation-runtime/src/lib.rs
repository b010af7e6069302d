//! # Validation Runtime Library
//!
//! Hosting process for the package signing validation pipeline. The binary in
//! `main.rs` loads configuration and runs a [`ValidationJob`]; this library
//! exposes the pieces for tests and embedding.
//!
//! ## Modules
//!
//! - `container/` - configuration, secret injection, component wiring
//! - `adapters/` - package source, queue and storage backends
//! - `job` - bounded-lifetime processor host

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod job;

pub use container::{
    CachingSecretResolver, ConfigError, ContainerError, EnvSecretResolver, JobConfig,
    QueueBackend, SecretError, SecretResolver, StorageBackend, ValidationContainer,
};
pub use job::{ExitReason, JobExit, ValidationJob};
