//! # Validation Job
//!
//! Runs the subscription processor for a bounded lifetime.
//!
//! ## Lifecycle
//!
//! ```text
//! start processor ──→ wait for (process_lifetime | shutdown signal)
//!                                    │
//!                                    ↓
//!                     shutdown(max_shutdown_time)
//!                                    │
//!                  drained ──────────┴────────── abandoned N in-flight
//! ```
//!
//! Abandoned messages are not lost: their leases expire and another
//! instance picks them up.

use crate::container::{ContainerError, JobConfig, ValidationContainer};
use crate::container::components::ConcreteProcessor;
use shared_bus::ProcessorError;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Why the job stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `process_lifetime` elapsed.
    LifetimeElapsed,
    /// The host asked the job to stop.
    Signalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobExit {
    pub reason: ExitReason,
    /// Messages still in flight when the shutdown deadline passed.
    pub abandoned: usize,
}

impl JobExit {
    pub fn drained(&self) -> bool {
        self.abandoned == 0
    }
}

pub struct ValidationJob {
    container: Arc<ValidationContainer>,
    processor: ConcreteProcessor,
}

impl ValidationJob {
    pub fn new(config: JobConfig) -> Result<Self, ContainerError> {
        Ok(Self::from_container(Arc::new(ValidationContainer::new(config)?)))
    }

    pub fn from_container(container: Arc<ValidationContainer>) -> Self {
        let processor = container.processor();
        Self {
            container,
            processor,
        }
    }

    pub fn container(&self) -> &Arc<ValidationContainer> {
        &self.container
    }

    pub fn processor(&self) -> &ConcreteProcessor {
        &self.processor
    }

    /// Process messages until `signal` completes or the lifetime elapses.
    pub async fn run_until<F>(&self, signal: F) -> Result<JobExit, ProcessorError>
    where
        F: Future<Output = ()>,
    {
        let lifetime = self.container.config.lifetime.clone();

        self.processor.start()?;
        info!(
            process_lifetime_secs = lifetime.process_lifetime.as_secs(),
            "Validation job running"
        );

        let reason = tokio::select! {
            _ = tokio::time::sleep(lifetime.process_lifetime) => {
                info!("Process lifetime elapsed, shutting down");
                ExitReason::LifetimeElapsed
            }
            _ = signal => {
                info!("Shutdown requested");
                ExitReason::Signalled
            }
        };

        let abandoned = if self.processor.shutdown(lifetime.max_shutdown_time).await {
            0
        } else {
            self.processor.number_of_messages_in_progress()
        };

        if abandoned > 0 {
            warn!(
                number_of_messages_in_progress = abandoned,
                max_shutdown_secs = lifetime.max_shutdown_time.as_secs(),
                "Shutdown deadline reached with messages in progress"
            );
        } else {
            info!("All in-flight messages settled");
        }

        Ok(JobExit { reason, abandoned })
    }
}
