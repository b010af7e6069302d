//! # Delivery Scenarios
//!
//! At-least-once delivery guarantees of the queue and the subscription
//! processor, alone and behind the runtime container.
//!
//! | Situation | Expected settlement |
//! |-----------|---------------------|
//! | Lease expires unsettled | Redelivered, delivery count + 1 |
//! | Unknown envelope schema | Dead-lettered |
//! | No status row for the id | Retried until the delivery limit |
//! | Shutdown with stuck handlers | `drained = false`, in-flight reported |
//! | Process restarts with messages queued or leased | Delivered by the next process |

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{Pipeline, Pki};
    use async_trait::async_trait;
    use shared_bus::{
        HandlerError, InMemoryQueue, MessageHandler, MessageQueue, ProcessorConfig, QueueError,
        SignatureValidationMessageSerializer, SubscriptionProcessor,
    };
    use validation_runtime::QueueBackend;
    use shared_types::{SignatureValidationMessage, ValidationRequest, ValidationStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    /// Handler that never returns.
    #[derive(Default)]
    struct StuckHandler {
        started: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler<SignatureValidationMessage> for StuckHandler {
        async fn handle(&self, _message: &SignatureValidationMessage) -> Result<(), HandlerError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn body_for(id: Uuid) -> Vec<u8> {
        use shared_bus::MessageSerializer;
        let request = ValidationRequest::new(id, "Foo", "1.0.0", "foo.pkg").unwrap();
        SignatureValidationMessageSerializer::new()
            .serialize(&SignatureValidationMessage::from_request(&request, Uuid::new_v4()))
            .unwrap()
    }

    // =========================================================================
    // PROCESSOR
    // =========================================================================

    /// Test: Shutdown with 5 stuck handlers reports them as not drained
    #[tokio::test]
    async fn test_shutdown_with_stuck_handlers() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(StuckHandler::default());
        let processor = SubscriptionProcessor::new(
            Arc::clone(&queue),
            Arc::new(SignatureValidationMessageSerializer::new()),
            Arc::clone(&handler),
            ProcessorConfig {
                max_concurrent_calls: 8,
                receive_wait: Duration::from_millis(20),
                ..ProcessorConfig::default()
            },
        );

        for _ in 0..5 {
            queue.send(body_for(Uuid::new_v4())).await.unwrap();
        }
        processor.start().unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while handler.started.load(Ordering::SeqCst) < 5 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let drained = processor.shutdown(Duration::from_secs(1)).await;
        assert!(!drained);
        assert_eq!(processor.number_of_messages_in_progress(), 5);
        assert_eq!(queue.in_flight(), 5);
    }

    // =========================================================================
    // QUEUE
    // =========================================================================

    /// Test: An unsettled lease expires and the message is redelivered
    #[tokio::test]
    async fn test_expired_lease_redelivered() {
        let queue = InMemoryQueue::with_visibility_timeout(Duration::from_millis(50));
        let message_id = queue.send(b"payload".to_vec()).await.unwrap();

        let first = queue.receive(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.delivery_count(), 1);
        assert!(queue.receive(Duration::ZERO).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(100)).await;

        let second = queue
            .receive(Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.message_id(), message_id);
        assert_eq!(second.delivery_count(), 2);

        assert_eq!(
            queue.ack(&first).await,
            Err(QueueError::LeaseLost { message_id })
        );
        queue.ack(&second).await.unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), 0);
    }

    // =========================================================================
    // CONTAINER
    // =========================================================================

    /// Test: Envelope with an unknown schema is dead-lettered
    #[tokio::test]
    async fn test_unknown_schema_dead_lettered() {
        let pipeline = Pipeline::new(&Pki::new());
        let body = serde_json::json!({
            "schema_name": "PackageDeletedMessageData",
            "schema_version": 1,
            "body": {}
        });
        pipeline
            .container
            .queue
            .send(serde_json::to_vec(&body).unwrap())
            .await
            .unwrap();

        pipeline.drain().await;

        let dead = pipeline.container.queue.dead_letters().unwrap();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].reason.contains("PackageDeletedMessageData"));
    }

    /// Test: Message for a validation that was never started is retried, not recorded
    #[tokio::test]
    async fn test_unknown_validation_id_retried_until_limit() {
        let pki = Pki::new();
        let pipeline = Pipeline::with_config(&pki, |config| {
            config.processor.max_delivery_count = 3;
        });
        let request = pipeline.publish("Plain.Lib", b"content");

        pipeline.send_message(&request).await;
        pipeline.drain().await;

        let dead = pipeline.container.queue.dead_letters().unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].delivery_count, 4);
        assert_eq!(
            pipeline.result(&request).await.status,
            ValidationStatus::NotStarted
        );
    }

    /// Test: Missing package content is retried and the row stays Incomplete
    #[tokio::test]
    async fn test_missing_package_stays_incomplete() {
        let pipeline = Pipeline::with_config(&Pki::new(), |config| {
            config.processor.max_delivery_count = 2;
        });
        let request = ValidationRequest::new(Uuid::new_v4(), "Gone", "1.0.0", "gone.pkg").unwrap();

        pipeline.start(&request).await;
        pipeline.drain().await;

        assert_eq!(
            pipeline.result(&request).await.status,
            ValidationStatus::Incomplete
        );
        assert_eq!(pipeline.container.queue.dead_letters().unwrap().len(), 1);
    }

    // =========================================================================
    // RESTART
    // =========================================================================

    /// Test: A validation enqueued before a restart completes in the next process
    #[tokio::test]
    async fn test_queued_validation_survives_restart() {
        let pki = Pki::new();
        let pipeline = Pipeline::durable(&pki, |_| {});
        let request = pipeline.publish("Contoso.Lib", &pki.signed(b"library"));

        pipeline.start(&request).await;
        assert_eq!(pipeline.container.queue.len().unwrap(), 1);

        let pipeline = pipeline.restart();
        assert_eq!(
            pipeline.start(&request).await.status,
            ValidationStatus::Incomplete
        );
        assert_eq!(pipeline.container.queue.len().unwrap(), 1);

        let results = pipeline.process(std::slice::from_ref(&request)).await;
        assert_eq!(results[0].status, ValidationStatus::Succeeded);
    }

    /// Test: A message leased by a process that died is redelivered after its lease expires
    #[tokio::test]
    async fn test_leased_message_redelivered_after_restart() {
        let pki = Pki::new();
        let pipeline = Pipeline::durable(&pki, |config| {
            config.queue.visibility_timeout = Duration::from_secs(1);
        });
        let request = pipeline.publish("Plain.Lib", b"content");

        pipeline.start(&request).await;
        let lease = pipeline
            .container
            .queue
            .receive(Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lease.delivery_count(), 1);

        let pipeline = pipeline.restart();
        assert_eq!(pipeline.container.queue.in_flight().unwrap(), 1);

        let results = pipeline.process(std::slice::from_ref(&request)).await;
        assert_eq!(results[0].status, ValidationStatus::Succeeded);
        assert!(pipeline.container.queue.is_empty().unwrap());
        assert_eq!(pipeline.container.queue.in_flight().unwrap(), 0);
    }

    /// Test: The process-local queue loses its messages on restart
    #[tokio::test]
    async fn test_memory_queue_does_not_survive_restart() {
        let pki = Pki::new();
        let pipeline = Pipeline::durable(&pki, |config| {
            config.queue.backend = QueueBackend::Memory;
        });
        let request = pipeline.publish("Plain.Lib", b"content");

        pipeline.start(&request).await;
        assert_eq!(pipeline.container.queue.len().unwrap(), 1);

        let pipeline = pipeline.restart();
        assert!(pipeline.container.queue.is_empty().unwrap());
        assert_eq!(
            pipeline.result(&request).await.status,
            ValidationStatus::Incomplete
        );
    }

    /// Test: Drained dead letters leave the queue
    #[tokio::test]
    async fn test_dead_letters_can_be_drained() {
        let pipeline = Pipeline::new(&Pki::new());
        pipeline
            .container
            .queue
            .send(b"not an envelope".to_vec())
            .await
            .unwrap();

        pipeline.drain().await;

        let drained = pipeline.container.queue.take_dead_letters().unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].message.body, b"not an envelope");
        assert!(pipeline.container.queue.dead_letters().unwrap().is_empty());
    }
}
