//! # Outbound Port

use crate::domain::EnqueueError;
use async_trait::async_trait;
use shared_types::ValidationRequest;
use uuid::Uuid;

/// Publishes the verification trigger.
///
/// Must only be called once the `Incomplete` row is persisted.
#[async_trait]
pub trait VerificationEnqueuer: Send + Sync {
    async fn enqueue_verification(
        &self,
        request: &ValidationRequest,
        request_id: Uuid,
    ) -> Result<(), EnqueueError>;
}
