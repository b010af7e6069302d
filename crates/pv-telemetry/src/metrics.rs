//! Prometheus metrics for the validation services.
//!
//! All metrics follow the naming convention: `pv_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., messages_received_total)
//! - **Gauge**: Value that can go up or down (e.g., messages_in_flight)
//! - **Histogram**: Distribution of values (e.g., handler_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ORCHESTRATOR METRICS
    // =========================================================================

    /// Validations started (status row created and message enqueued)
    pub static ref VALIDATIONS_STARTED: Counter = Counter::new(
        "pv_orchestrator_validations_started_total",
        "Total number of validations started"
    ).expect("metric creation failed");

    /// Start requests for validations that had already started
    pub static ref DUPLICATE_STARTS: Counter = Counter::new(
        "pv_orchestrator_duplicate_starts_total",
        "Total number of start requests for validations already in progress or complete"
    ).expect("metric creation failed");

    // =========================================================================
    // VALIDATOR METRICS
    // =========================================================================

    /// Terminal validation outcomes
    pub static ref VALIDATION_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("pv_validator_outcomes_total", "Terminal validation outcomes"),
        &["state", "issue"]  // state: Succeeded/Failed, issue: issue code or "none"
    ).expect("metric creation failed");

    /// Certificates newly written to the certificate store
    pub static ref CERTIFICATES_STORED: Counter = Counter::new(
        "pv_validator_certificates_stored_total",
        "Total number of certificates newly stored"
    ).expect("metric creation failed");

    // =========================================================================
    // MESSAGE PROCESSOR METRICS
    // =========================================================================

    /// Messages received from the subscription
    pub static ref MESSAGES_RECEIVED: Counter = Counter::new(
        "pv_processor_messages_received_total",
        "Total messages received from the subscription"
    ).expect("metric creation failed");

    /// Messages settled, by outcome
    pub static ref MESSAGES_SETTLED: CounterVec = CounterVec::new(
        Opts::new("pv_processor_messages_settled_total", "Messages settled by outcome"),
        &["outcome"]  // outcome: completed/retried/dead_lettered
    ).expect("metric creation failed");

    /// Messages currently being handled
    pub static ref MESSAGES_IN_FLIGHT: Gauge = Gauge::new(
        "pv_processor_messages_in_flight",
        "Number of messages currently being handled"
    ).expect("metric creation failed");

    /// Dead-lettered messages held by the queue and not yet drained
    pub static ref QUEUE_DEAD_LETTERS: Gauge = Gauge::new(
        "pv_queue_dead_letters",
        "Dead-lettered messages waiting to be drained"
    ).expect("metric creation failed");

    /// Handler duration
    pub static ref HANDLER_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "pv_processor_handler_duration_seconds",
            "Time spent handling one message"
        ).buckets(exponential_buckets(0.001, 2.0, 16).unwrap())
    ).expect("metric creation failed");
}

/// Handle to the registered metrics.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Orchestrator
        Box::new(VALIDATIONS_STARTED.clone()),
        Box::new(DUPLICATE_STARTS.clone()),
        // Validator
        Box::new(VALIDATION_OUTCOMES.clone()),
        Box::new(CERTIFICATES_STORED.clone()),
        // Processor
        Box::new(MESSAGES_RECEIVED.clone()),
        Box::new(MESSAGES_SETTLED.clone()),
        Box::new(MESSAGES_IN_FLIGHT.clone()),
        Box::new(QUEUE_DEAD_LETTERS.clone()),
        Box::new(HANDLER_DURATION.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
