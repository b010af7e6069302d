//! # Shared Fixtures
//!
//! A deterministic signing PKI and a fully wired pipeline whose package root
//! is a temp directory.

use pv_02_certificate_store::Thumbprint;
use pv_03_signature_extraction::{seed_from, CertificateIssuer, PackageSigner};
use pv_05_orchestrator::{ValidationResult, Validator};
use shared_bus::{MessageSerializer, SignatureValidationMessageSerializer};
use shared_types::{SignatureValidationMessage, ValidationRequest};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;
use validation_runtime::{JobConfig, JobExit, StorageBackend, ValidationContainer, ValidationJob};

/// Upper bound on any pipeline run in these tests.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

const POLL: Duration = Duration::from_millis(10);

// =============================================================================
// PKI
// =============================================================================

/// Trusted and untrusted signing chains, valid forever.
pub struct Pki {
    pub root: CertificateIssuer,
    pub leaf: CertificateIssuer,
    pub rogue_root: CertificateIssuer,
    pub rogue_leaf: CertificateIssuer,
}

impl Pki {
    pub fn new() -> Self {
        let root = CertificateIssuer::root_from_name("CN=Registry Root", 0, i64::MAX);
        let leaf = root.issue("CN=Contoso", seed_from("contoso"), 2, 0, i64::MAX, false);
        let rogue_root = CertificateIssuer::root_from_name("CN=Rogue Root", 0, i64::MAX);
        let rogue_leaf =
            rogue_root.issue("CN=Mallory", seed_from("mallory"), 2, 0, i64::MAX, false);
        Self {
            root,
            leaf,
            rogue_root,
            rogue_leaf,
        }
    }

    pub fn root_thumbprint(&self) -> Thumbprint {
        Thumbprint::of(&self.root.encoded_certificate().unwrap())
    }

    /// `content` signed by the trusted chain.
    pub fn signed(&self, content: &[u8]) -> Vec<u8> {
        PackageSigner::new(&self.leaf)
            .with_chain_certificate(&self.root)
            .unwrap()
            .sign_package(content, 1_000)
            .unwrap()
    }

    /// `content` signed by a chain ending in an untrusted root.
    pub fn signed_by_rogue(&self, content: &[u8]) -> Vec<u8> {
        PackageSigner::new(&self.rogue_leaf)
            .with_chain_certificate(&self.rogue_root)
            .unwrap()
            .sign_package(content, 1_000)
            .unwrap()
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Every component wired over in-memory storage and a temp package root.
pub struct Pipeline {
    pub container: Arc<ValidationContainer>,
    packages: TempDir,
}

impl Pipeline {
    /// Signed packages allowed, `pki`'s root trusted.
    pub fn new(pki: &Pki) -> Self {
        Self::with_config(pki, |_| {})
    }

    pub fn with_config(pki: &Pki, customize: impl FnOnce(&mut JobConfig)) -> Self {
        Self::build(pki, |config, _| customize(config))
    }

    /// File-backed storage next to the packages, so state and queue survive
    /// [`Pipeline::restart`].
    pub fn durable(pki: &Pki, customize: impl FnOnce(&mut JobConfig)) -> Self {
        Self::build(pki, |config, packages| {
            config.storage.backend = StorageBackend::File;
            config.storage.path = packages.join("state.db").to_string_lossy().to_string();
            customize(config);
        })
    }

    fn build(pki: &Pki, customize: impl FnOnce(&mut JobConfig, &Path)) -> Self {
        let packages = tempfile::tempdir().unwrap();

        let mut config = JobConfig::default();
        config.package_source.root = packages.path().to_string_lossy().to_string();
        config.processor.receive_wait = Duration::from_millis(20);
        config.processor.max_concurrent_calls = 4;
        config.verification.policy.allow_signed_packages = true;
        config.verification.trusted_signing_roots = vec![pki.root_thumbprint().to_string()];
        customize(&mut config, packages.path());

        Self {
            container: Arc::new(ValidationContainer::new(config).unwrap()),
            packages,
        }
    }

    /// Drop every component and wire them again from the same config, as a
    /// replacement process would.
    pub fn restart(self) -> Self {
        let Self {
            container,
            packages,
        } = self;
        let config = container.config.clone();
        drop(container);

        Self {
            container: Arc::new(ValidationContainer::new(config).unwrap()),
            packages,
        }
    }

    /// Store `bytes` as `{name}.pkg` and return a request pointing at it.
    pub fn publish(&self, name: &str, bytes: &[u8]) -> ValidationRequest {
        let file = format!("{}.pkg", name);
        std::fs::write(self.packages.path().join(&file), bytes).unwrap();
        ValidationRequest::new(Uuid::new_v4(), name, "1.0.0", file).unwrap()
    }

    pub async fn start(&self, request: &ValidationRequest) -> ValidationResult {
        self.container
            .orchestrator
            .start_validation(request)
            .await
            .unwrap()
    }

    pub async fn result(&self, request: &ValidationRequest) -> ValidationResult {
        self.container.orchestrator.get_result(request).await.unwrap()
    }

    /// Enqueue a raw verification message for `request`, bypassing the
    /// orchestrator.
    pub async fn send_message(&self, request: &ValidationRequest) {
        let message = SignatureValidationMessage::from_request(request, Uuid::new_v4());
        let body = SignatureValidationMessageSerializer::new()
            .serialize(&message)
            .unwrap();
        shared_bus::MessageQueue::send(self.container.queue.as_ref(), body)
            .await
            .unwrap();
    }

    /// Run a job until every request reaches a terminal state.
    pub async fn process(&self, requests: &[ValidationRequest]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let settled = async {
            loop {
                let mut current = Vec::with_capacity(requests.len());
                for request in requests {
                    current.push(self.result(request).await);
                }
                if current.iter().all(ValidationResult::is_terminal) {
                    results = current;
                    return;
                }
                tokio::time::sleep(POLL).await;
            }
        };

        let exit = self.run(settled).await;
        assert!(exit.drained());
        results
    }

    /// Run a job until nothing is waiting or leased.
    pub async fn drain(&self) -> JobExit {
        let queue = Arc::clone(&self.container.queue);
        self.run(async move {
            while !(queue.is_empty().unwrap() && queue.in_flight().unwrap() == 0) {
                tokio::time::sleep(POLL).await;
            }
        })
        .await
    }

    async fn run(&self, until: impl std::future::Future<Output = ()>) -> JobExit {
        let job = ValidationJob::from_container(Arc::clone(&self.container));
        tokio::time::timeout(SETTLE_TIMEOUT, job.run_until(until))
            .await
            .expect("pipeline did not settle")
            .unwrap()
    }
}
