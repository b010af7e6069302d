//! Queue-backed verification enqueuer.

use crate::domain::EnqueueError;
use crate::ports::outbound::VerificationEnqueuer;
use async_trait::async_trait;
use shared_bus::{MessageQueue, MessageSerializer};
use shared_types::{SignatureValidationMessage, ValidationRequest};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct QueueVerificationEnqueuer<Q, S>
where
    Q: MessageQueue,
    S: MessageSerializer<SignatureValidationMessage>,
{
    queue: Arc<Q>,
    serializer: Arc<S>,
}

impl<Q, S> QueueVerificationEnqueuer<Q, S>
where
    Q: MessageQueue,
    S: MessageSerializer<SignatureValidationMessage>,
{
    pub fn new(queue: Arc<Q>, serializer: Arc<S>) -> Self {
        Self { queue, serializer }
    }
}

#[async_trait]
impl<Q, S> VerificationEnqueuer for QueueVerificationEnqueuer<Q, S>
where
    Q: MessageQueue + 'static,
    S: MessageSerializer<SignatureValidationMessage> + 'static,
{
    async fn enqueue_verification(
        &self,
        request: &ValidationRequest,
        request_id: Uuid,
    ) -> Result<(), EnqueueError> {
        let message = SignatureValidationMessage::from_request(request, request_id);
        let body = self.serializer.serialize(&message)?;
        let message_id = self.queue.send(body).await?;
        debug!(
            validation_id = %request.validation_id(),
            message_id = %message_id,
            request_id = %request_id,
            "Enqueued signature verification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::{InMemoryQueue, SignatureValidationMessageSerializer};

    /// Test: Enqueued body decodes to the request's message
    #[tokio::test]
    async fn test_enqueue_publishes_message() {
        let queue = Arc::new(InMemoryQueue::new());
        let serializer = Arc::new(SignatureValidationMessageSerializer::new());
        let enqueuer = QueueVerificationEnqueuer::new(queue.clone(), serializer.clone());

        let request =
            ValidationRequest::new(Uuid::new_v4(), "Foo", "1.0.0", "foo.1.0.0.pkg").unwrap();
        let request_id = Uuid::new_v4();
        enqueuer.enqueue_verification(&request, request_id).await.unwrap();

        let bodies = queue.pending_bodies();
        assert_eq!(bodies.len(), 1);
        let message = serializer.deserialize(&bodies[0]).unwrap();
        assert_eq!(message.validation_id, request.validation_id());
        assert_eq!(message.request_id, request_id);
    }
}
