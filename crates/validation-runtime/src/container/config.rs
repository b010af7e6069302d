//! # Job Configuration
//!
//! Unified configuration for the validation job.
//!
//! ## Loading Order
//!
//! 1. JSON file (every field optional, missing sections use defaults)
//! 2. `PV_*` environment overrides
//! 3. `$$Name$$` secret placeholders resolved through a [`SecretResolver`]
//!
//! Durations are written as integer seconds, except `processor.receive_wait_ms`.

use crate::container::secrets::{inject_secrets, SecretError, SecretResolver};
use pv_04_signature_validation::SigningPolicy;
use pv_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use shared_bus::{ProcessorConfig, DEFAULT_MAX_DELIVERY_COUNT, DEFAULT_VISIBILITY_TIMEOUT};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid config file: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {name}")]
    InvalidOverride { name: &'static str, value: String },

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] SecretError),
}

/// Complete job configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub processor: ProcessorSettings,
    pub package_source: PackageSourceConfig,
    pub verification: VerificationConfig,
    pub lifetime: LifetimeConfig,
    pub telemetry: TelemetrySettings,
}

/// Key-value storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit.
    #[default]
    Memory,
    /// Single file with an exclusive lock.
    File,
    /// RocksDB directory (feature `rocksdb`).
    RocksDb,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "rocksdb" => Ok(StorageBackend::RocksDb),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// File or directory for persistent backends. May hold secrets.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: "./data/validation.db".to_string(),
        }
    }
}

/// Where verification messages are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// In the configured key-value store. Survives restarts with a
    /// persistent storage backend.
    #[default]
    Store,
    /// Process-local, lost on exit.
    Memory,
}

impl FromStr for QueueBackend {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "store" => Ok(QueueBackend::Store),
            "memory" => Ok(QueueBackend::Memory),
            _ => Err(()),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    /// Lease duration before an unsettled message is redelivered.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub visibility_timeout: Duration,
    /// Age after which an `Incomplete` row that never reached the queue may be
    /// re-enqueued by a later start.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub enqueue_claim_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Store,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            enqueue_claim_timeout: pv_05_orchestrator::DEFAULT_ENQUEUE_CLAIM_TIMEOUT,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    pub max_concurrent_calls: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "receive_wait_ms")]
    pub receive_wait: Duration,
    pub max_delivery_count: u32,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_calls: num_cpus::get().max(1),
            receive_wait: Duration::from_secs(5),
            max_delivery_count: DEFAULT_MAX_DELIVERY_COUNT,
        }
    }
}

impl ProcessorSettings {
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            max_concurrent_calls: self.max_concurrent_calls.max(1),
            receive_wait: self.receive_wait,
            max_delivery_count: self.max_delivery_count,
            ..ProcessorConfig::default()
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSourceConfig {
    /// Directory packages are read from. May hold secrets.
    pub root: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub download_timeout: Duration,
}

impl Default for PackageSourceConfig {
    fn default() -> Self {
        Self {
            root: "./packages".to_string(),
            download_timeout: pv_04_signature_validation::DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub policy: SigningPolicy,
    /// Hex SHA-256 thumbprints of trusted signing roots.
    pub trusted_signing_roots: Vec<String>,
    /// Hex SHA-256 thumbprints of trusted timestamp roots.
    pub trusted_timestamp_roots: Vec<String>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifetimeConfig {
    /// Wall-clock time after which the process shuts down for recycling.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub process_lifetime: Duration,
    /// Upper bound on waiting for in-flight messages at shutdown.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub max_shutdown_time: Duration,
}

impl Default for LifetimeConfig {
    fn default() -> Self {
        Self {
            process_lifetime: Duration::from_secs(24 * 60 * 60),
            max_shutdown_time: Duration::from_secs(60),
        }
    }
}

/// Overrides on top of the environment-derived telemetry config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub service_name: Option<String>,
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
}

impl TelemetrySettings {
    pub fn apply(&self, mut config: TelemetryConfig) -> TelemetryConfig {
        if let Some(name) = &self.service_name {
            config.service_name = name.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(json) = self.json_logs {
            config.json_logs = json;
        }
        config
    }
}

impl JobConfig {
    /// Load from a JSON file, apply environment overrides and resolve secrets.
    pub async fn load(
        path: impl AsRef<Path>,
        resolver: &dyn SecretResolver,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut config = Self::from_json(&raw)?;
        config.apply_env_overrides()?;
        config.resolve_secrets(resolver).await?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `PV_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("PV_STORAGE_BACKEND") {
            self.storage.backend = value.parse().map_err(|_| ConfigError::InvalidOverride {
                name: "PV_STORAGE_BACKEND",
                value,
            })?;
        }
        if let Some(value) = lookup("PV_QUEUE_BACKEND") {
            self.queue.backend = value.parse().map_err(|_| ConfigError::InvalidOverride {
                name: "PV_QUEUE_BACKEND",
                value,
            })?;
        }
        if let Some(value) = lookup("PV_STORAGE_PATH") {
            self.storage.path = value;
        }
        if let Some(value) = lookup("PV_PACKAGE_ROOT") {
            self.package_source.root = value;
        }
        if let Some(secs) = parse_override::<u64>(&lookup, "PV_DOWNLOAD_TIMEOUT_SECS")? {
            self.package_source.download_timeout = Duration::from_secs(secs);
        }
        if let Some(calls) = parse_override::<usize>(&lookup, "PV_MAX_CONCURRENT_CALLS")? {
            self.processor.max_concurrent_calls = calls;
        }
        if let Some(secs) = parse_override::<u64>(&lookup, "PV_PROCESS_LIFETIME_SECS")? {
            self.lifetime.process_lifetime = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_override::<u64>(&lookup, "PV_MAX_SHUTDOWN_SECS")? {
            self.lifetime.max_shutdown_time = Duration::from_secs(secs);
        }
        if let Some(allow) = parse_override::<bool>(&lookup, "PV_ALLOW_SIGNED_PACKAGES")? {
            self.verification.policy.allow_signed_packages = allow;
        }
        Ok(())
    }

    /// Resolve `$$Name$$` placeholders in every secret-bearing field.
    pub async fn resolve_secrets(&mut self, resolver: &dyn SecretResolver) -> Result<(), ConfigError> {
        self.storage.path = inject_secrets(&self.storage.path, resolver).await?;
        self.package_source.root = inject_secrets(&self.package_source.root, resolver).await?;
        for root in self
            .verification
            .trusted_signing_roots
            .iter_mut()
            .chain(self.verification.trusted_timestamp_roots.iter_mut())
        {
            *root = inject_secrets(root, resolver).await?;
        }
        Ok(())
    }
}

fn parse_override<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { name, value })
        })
        .transpose()
}
