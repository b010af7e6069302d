//! # Pipeline Scenarios
//!
//! Start → enqueue → extract → verify → result, through the real
//! components wired by the runtime container.
//!
//! ```text
//! [Orchestrator] ──SignatureValidationMessage──→ [Queue]
//!                                                  │
//!                                                  ↓
//!                                      [SubscriptionProcessor]
//!                                                  │
//!                                                  ↓
//!                     [SignatureValidator: extract, minimal, full]
//!                                                  │
//!                                                  ↓
//!                                       [ValidatorStateStore]
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{Pipeline, Pki};
    use pv_03_signature_extraction::{seal_package, SignatureMetadataRepository};
    use pv_04_signature_validation::{PackageSigningStateStore, PackageSigningStatus};
    use shared_bus::{MessageSerializer, SignatureValidationMessageSerializer};
    use shared_types::{IssueCode, PackageKey, ValidationRequest, ValidationStatus};
    use std::sync::Arc;
    use uuid::Uuid;

    fn codes(issues: &[shared_types::ValidationIssue]) -> Vec<IssueCode> {
        issues.iter().map(|issue| issue.code).collect()
    }

    fn signing_status(pipeline: &Pipeline, request: &ValidationRequest) -> Option<PackageSigningStatus> {
        pipeline
            .container
            .signing_state
            .get(&PackageKey::new(request.package_id(), request.package_version()))
            .unwrap()
            .map(|state| state.status)
    }

    // =========================================================================
    // START
    // =========================================================================

    /// Test: Start on an empty store enqueues exactly one message for V1
    #[tokio::test]
    async fn test_start_enqueues_one_message() {
        let pipeline = Pipeline::new(&Pki::new());
        let v1 = Uuid::new_v4();
        let request = ValidationRequest::new(v1, "Foo", "1.0.0", "foo.pkg").unwrap();

        let result = pipeline.start(&request).await;
        assert_eq!(result.status, ValidationStatus::Incomplete);

        let bodies = pipeline.container.queue.pending_bodies().unwrap();
        assert_eq!(bodies.len(), 1);
        let message = SignatureValidationMessageSerializer::new()
            .deserialize(&bodies[0])
            .unwrap();
        assert_eq!(message.validation_id, v1);
        assert_eq!(message.package_id, "Foo");
        assert_eq!(message.content_url, "foo.pkg");
    }

    /// Test: Concurrent starts for one validation id enqueue once
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_enqueue_once() {
        let pipeline = Arc::new(Pipeline::new(&Pki::new()));
        let request = ValidationRequest::new(Uuid::new_v4(), "Foo", "1.0.0", "foo.pkg").unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                let request = request.clone();
                tokio::spawn(async move { pipeline.start(&request).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().status, ValidationStatus::Incomplete);
        }

        assert_eq!(pipeline.container.queue.len().unwrap(), 1);
    }

    /// Test: Result of a validation that was never started
    #[tokio::test]
    async fn test_result_before_start() {
        let pipeline = Pipeline::new(&Pki::new());
        let request = ValidationRequest::new(Uuid::new_v4(), "Foo", "1.0.0", "foo.pkg").unwrap();
        assert_eq!(
            pipeline.result(&request).await.status,
            ValidationStatus::NotStarted
        );
        assert!(pipeline.container.queue.is_empty().unwrap());
    }

    // =========================================================================
    // OUTCOMES
    // =========================================================================

    /// Test: Trusted signature succeeds with metadata and certificates stored
    #[tokio::test]
    async fn test_trusted_signature_succeeds() {
        let pki = Pki::new();
        let pipeline = Pipeline::new(&pki);
        let request = pipeline.publish("Contoso.Lib", &pki.signed(b"library"));

        pipeline.start(&request).await;
        let results = pipeline.process(std::slice::from_ref(&request)).await;

        assert_eq!(results[0].status, ValidationStatus::Succeeded);
        assert!(results[0].issues.is_empty());

        let metadata = pipeline
            .container
            .metadata
            .get(request.validation_id())
            .unwrap()
            .unwrap();
        assert_eq!(metadata.signing_chain.len(), 2);
        assert!(pipeline.container.certificates.count().unwrap() >= 1);
        assert_eq!(signing_status(&pipeline, &request), Some(PackageSigningStatus::Valid));
    }

    /// Test: Chain ending in an untrusted root fails with UntrustedChain
    #[tokio::test]
    async fn test_untrusted_chain_fails() {
        let pki = Pki::new();
        let pipeline = Pipeline::new(&pki);
        let request = pipeline.publish("Rogue.Lib", &pki.signed_by_rogue(b"library"));

        pipeline.start(&request).await;
        let results = pipeline.process(std::slice::from_ref(&request)).await;

        assert_eq!(results[0].status, ValidationStatus::Failed);
        assert_eq!(codes(&results[0].issues), vec![IssueCode::UntrustedChain]);
        assert_eq!(signing_status(&pipeline, &request), Some(PackageSigningStatus::Invalid));
    }

    /// Test: Default policy rejects every signed package
    #[tokio::test]
    async fn test_signed_packages_blocked_by_default_policy() {
        let pki = Pki::new();
        let pipeline = Pipeline::with_config(&pki, |config| {
            config.verification.policy.allow_signed_packages = false;
        });
        let request = pipeline.publish("Contoso.Lib", &pki.signed(b"library"));

        pipeline.start(&request).await;
        let results = pipeline.process(std::slice::from_ref(&request)).await;

        assert_eq!(results[0].status, ValidationStatus::Failed);
        assert_eq!(codes(&results[0].issues), vec![IssueCode::PackageIsSigned]);
    }

    /// Test: Unsigned package succeeds without metadata or certificates
    #[tokio::test]
    async fn test_unsigned_package_succeeds() {
        let pipeline = Pipeline::new(&Pki::new());
        let request = pipeline.publish("Plain.Lib", b"no signature here");

        pipeline.start(&request).await;
        let results = pipeline.process(std::slice::from_ref(&request)).await;

        assert_eq!(results[0].status, ValidationStatus::Succeeded);
        assert!(pipeline
            .container
            .metadata
            .get(request.validation_id())
            .unwrap()
            .is_none());
        assert_eq!(pipeline.container.certificates.count().unwrap(), 0);
        assert_eq!(
            signing_status(&pipeline, &request),
            Some(PackageSigningStatus::Unsigned)
        );
    }

    /// Test: Malformed signature block fails and the message is acknowledged
    #[tokio::test]
    async fn test_malformed_signature_fails_and_acks() {
        let pipeline = Pipeline::new(&Pki::new());
        let request = pipeline.publish("Broken.Lib", &seal_package(b"content", b"garbage"));

        pipeline.start(&request).await;
        let results = pipeline.process(std::slice::from_ref(&request)).await;

        assert_eq!(results[0].status, ValidationStatus::Failed);
        assert_eq!(codes(&results[0].issues), vec![IssueCode::MalformedSignature]);

        let queue = &pipeline.container.queue;
        assert!(queue.is_empty().unwrap());
        assert_eq!(queue.in_flight().unwrap(), 0);
        assert!(queue.dead_letters().unwrap().is_empty());
    }

    // =========================================================================
    // IDEMPOTENCY
    // =========================================================================

    /// Test: Certificates shared by two packages are stored once
    #[tokio::test]
    async fn test_shared_certificates_stored_once() {
        let pki = Pki::new();
        let pipeline = Pipeline::new(&pki);
        let first = pipeline.publish("First.Lib", &pki.signed(b"first"));
        let second = pipeline.publish("Second.Lib", &pki.signed(b"second"));

        pipeline.start(&first).await;
        pipeline.start(&second).await;
        let results = pipeline.process(&[first, second]).await;

        assert!(results
            .iter()
            .all(|result| result.status == ValidationStatus::Succeeded));
        // Leaf and root
        assert_eq!(pipeline.container.certificates.count().unwrap(), 2);
    }

    /// Test: A redelivered message leaves the terminal state and rows unchanged
    #[tokio::test]
    async fn test_duplicate_delivery_is_absorbed() {
        let pki = Pki::new();
        let pipeline = Pipeline::new(&pki);
        let request = pipeline.publish("Contoso.Lib", &pki.signed(b"library"));

        pipeline.start(&request).await;
        let first = pipeline.process(std::slice::from_ref(&request)).await;
        let certificates = pipeline.container.certificates.count().unwrap();

        pipeline.send_message(&request).await;
        let exit = pipeline.drain().await;
        assert!(exit.drained());

        let second = pipeline.result(&request).await;
        assert_eq!(second, first[0]);
        assert_eq!(pipeline.container.certificates.count().unwrap(), certificates);

        let key = PackageKey::new(request.package_id(), request.package_version());
        assert_eq!(pipeline.container.metadata.for_package(&key).unwrap().len(), 1);
        assert!(pipeline.container.queue.dead_letters().unwrap().is_empty());
    }

    /// Test: A second start after completion returns the terminal state
    #[tokio::test]
    async fn test_start_after_completion_returns_terminal_state() {
        let pipeline = Pipeline::new(&Pki::new());
        let request = pipeline.publish("Plain.Lib", b"content");

        pipeline.start(&request).await;
        pipeline.process(std::slice::from_ref(&request)).await;

        let again = pipeline.start(&request).await;
        assert_eq!(again.status, ValidationStatus::Succeeded);
        assert!(pipeline.container.queue.is_empty().unwrap());
    }
}
