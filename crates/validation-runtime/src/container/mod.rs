//! # Container Module
//!
//! Configuration loading, secret injection and component wiring.

pub mod components;
pub mod config;
pub mod secrets;

pub use components::{ContainerError, ValidationContainer};
pub use config::{ConfigError, JobConfig, QueueBackend, StorageBackend};
pub use secrets::{CachingSecretResolver, EnvSecretResolver, SecretError, SecretResolver};
