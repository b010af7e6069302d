//! # Package Signing Validation Job
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, `PV_*` environment, secrets)
//! 2. Initialize logging and metrics
//! 3. Wire storage, queue, extractor, verifiers and orchestrator
//! 4. Process verification messages until Ctrl+C or the process lifetime
//!
//! The configuration path is the first argument, or `PV_CONFIG`, or
//! `validation.json`.

use anyhow::{Context, Result};
use pv_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{error, info};
use validation_runtime::{CachingSecretResolver, EnvSecretResolver, JobConfig, ValidationJob};

const DEFAULT_CONFIG_PATH: &str = "validation.json";

fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PV_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let resolver = CachingSecretResolver::new(EnvSecretResolver);
    let config = JobConfig::load(&path, &resolver)
        .await
        .with_context(|| format!("Failed to load configuration from {}", path))?;

    let telemetry = config.telemetry.apply(TelemetryConfig::from_env());
    let _telemetry = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    info!(config = %path, backend = ?config.storage.backend, "Starting package signing validation job");

    let job = ValidationJob::new(config).context("Failed to initialize components")?;

    let exit = job
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!(reason = ?exit.reason, abandoned = exit.abandoned, "Validation job stopped");
    Ok(())
}
