//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Include source file and line in log lines
    pub with_source_location: bool,

    /// Deployment environment (dev, int, prod)
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "package-validation".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_source_location: false,
            environment: "dev".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PV_SERVICE_NAME`: Service name (default: package-validation)
    /// - `PV_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `PV_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `PV_LOG_SOURCE`: Include file/line in logs (default: false)
    /// - `PV_ENVIRONMENT`: Deployment environment (default: dev)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("PV_SERVICE_NAME")
                .unwrap_or_else(|_| "package-validation".to_string()),

            log_level: env::var("PV_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("PV_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            with_source_location: env::var("PV_LOG_SOURCE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            environment: env::var("PV_ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
        }
    }

    /// Configuration for a named job (e.g. `extract-and-validate`).
    pub fn for_job(job_name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("package-validation-{}", job_name);
        config
    }
}
