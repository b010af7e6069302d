//! Structured logging.
//!
//! Logs are emitted through `tracing` with consistent fields so that a log
//! shipper can index them:
//! - `validation_id`: The validation attempt
//! - `package_id` / `package_version`: The package under validation
//! - `component`: Which component produced the line

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global `tracing` subscriber.
///
/// Uses a JSON layer for containers and a human-readable layer otherwise.
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(config.with_source_location)
                    .with_line_number(config.with_source_location),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(config.with_source_location)
                    .with_line_number(config.with_source_location),
            )
            .try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        environment = %config.environment,
        json_logs = config.json_logs,
        "Structured logging configured"
    );

    Ok(())
}

/// Log a validation-related event with the standard fields.
#[macro_export]
macro_rules! log_validation_event {
    ($level:ident, $component:expr, $msg:expr, $validation_id:expr, $package_id:expr, $package_version:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            validation_id = %$validation_id,
            package_id = %$package_id,
            package_version = %$package_version,
            $($($field)*,)?
            $msg
        )
    };
}
