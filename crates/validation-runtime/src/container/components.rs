//! # Validation Container
//!
//! Builds every component explicitly from a [`JobConfig`] and holds them for
//! the lifetime of the job.
//!
//! ## Initialization Order
//!
//! ```text
//! Phase 1: Key-value store (one instance shared by all stores below)
//! Phase 2: Status table, certificate store, metadata, signing state
//! Phase 3: Verification queue (store-backed or in-memory) and serializer
//! Phase 4: Extractor, verifiers, signature validator
//! Phase 5: Orchestrator (start / get-result)
//! ```

use crate::adapters::{ConfiguredQueue, ConfiguredStore, FileSystemPackageSource, KvMessageQueue};
use crate::container::config::{JobConfig, QueueBackend, StorageBackend};
use pv_01_validator_state::{FileBackedKVStore, InMemoryKVStore, KVStoreError, KvValidatorStateStore};
use pv_02_certificate_store::{KvCertificateStore, Thumbprint};
use pv_03_signature_extraction::{KvSignatureMetadataRepository, SignaturePartsExtractor};
use pv_04_signature_validation::{
    FullPackageSignatureVerifier, KvPackageSigningStateStore, MinimalPackageSignatureVerifier,
    SignatureValidationMessageHandler, SignatureValidator, TrustStore,
};
use pv_05_orchestrator::{PackageSigningValidator, QueueVerificationEnqueuer};
use shared_bus::{InMemoryQueue, SignatureValidationMessageSerializer, SubscriptionProcessor};
use shared_types::SignatureValidationMessage;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Failed to open storage: {0}")]
    Storage(#[from] KVStoreError),

    #[error("Storage backend '{0}' is not compiled in")]
    UnsupportedBackend(&'static str),

    #[error("Invalid trusted root thumbprint: {0}")]
    InvalidTrustedRoot(String),
}

pub type StateStore = KvValidatorStateStore<ConfiguredStore>;
pub type CertificateStore = KvCertificateStore<ConfiguredStore>;
pub type MetadataRepository = KvSignatureMetadataRepository<ConfiguredStore>;
pub type SigningStateStore = KvPackageSigningStateStore<ConfiguredStore>;
pub type Extractor = SignaturePartsExtractor<CertificateStore, MetadataRepository>;

pub type ConcreteSignatureValidator =
    SignatureValidator<StateStore, Extractor, FileSystemPackageSource, SigningStateStore>;

pub type JobQueue = ConfiguredQueue<ConfiguredStore>;

pub type ConcreteEnqueuer =
    QueueVerificationEnqueuer<JobQueue, SignatureValidationMessageSerializer>;

pub type ConcreteOrchestrator = PackageSigningValidator<StateStore, ConcreteEnqueuer>;

pub type ConcreteHandler = SignatureValidationMessageHandler<ConcreteSignatureValidator>;

pub type ConcreteProcessor = SubscriptionProcessor<
    SignatureValidationMessage,
    JobQueue,
    SignatureValidationMessageSerializer,
    ConcreteHandler,
>;

/// Every component of the job, wired once.
pub struct ValidationContainer {
    pub store: Arc<ConfiguredStore>,
    pub state: Arc<StateStore>,
    pub certificates: Arc<CertificateStore>,
    pub metadata: Arc<MetadataRepository>,
    pub signing_state: Arc<SigningStateStore>,

    pub queue: Arc<JobQueue>,
    pub serializer: Arc<SignatureValidationMessageSerializer>,

    pub validator: Arc<ConcreteSignatureValidator>,
    pub orchestrator: Arc<ConcreteOrchestrator>,

    /// Immutable after initialization.
    pub config: JobConfig,
}

/// Open the configured backend.
pub fn open_store(config: &JobConfig) -> Result<ConfiguredStore, ContainerError> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(ConfiguredStore::InMemory(InMemoryKVStore::new())),
        StorageBackend::File => Ok(ConfiguredStore::File(FileBackedKVStore::open(
            &config.storage.path,
        )?)),
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb => Ok(ConfiguredStore::RocksDb(
            crate::adapters::storage::RocksDbStore::open_default(&config.storage.path)?,
        )),
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb => Err(ContainerError::UnsupportedBackend("rocksdb")),
    }
}

/// Open the configured queue. The store-backed queue shares `store` with
/// the status table.
pub fn open_queue(config: &JobConfig, store: &Arc<ConfiguredStore>) -> JobQueue {
    match config.queue.backend {
        QueueBackend::Store => ConfiguredQueue::Store(KvMessageQueue::new(
            Arc::clone(store),
            config.queue.visibility_timeout,
        )),
        QueueBackend::Memory => ConfiguredQueue::InMemory(InMemoryQueue::with_visibility_timeout(
            config.queue.visibility_timeout,
        )),
    }
}

/// Trust store from configured root thumbprints.
pub fn trust_store(config: &JobConfig) -> Result<TrustStore, ContainerError> {
    let parse = |value: &String| {
        Thumbprint::parse(value).map_err(|_| ContainerError::InvalidTrustedRoot(value.clone()))
    };

    let mut trust = TrustStore::new();
    for root in &config.verification.trusted_signing_roots {
        trust = trust.with_signing_root(parse(root)?);
    }
    for root in &config.verification.trusted_timestamp_roots {
        trust = trust.with_timestamp_root(parse(root)?);
    }
    Ok(trust)
}

impl ValidationContainer {
    /// Open the configured store and wire everything on top of it.
    pub fn new(config: JobConfig) -> Result<Self, ContainerError> {
        let store = open_store(&config)?;
        Self::with_store(config, store)
    }

    #[instrument(name = "container_init", skip_all)]
    pub fn with_store(config: JobConfig, store: ConfiguredStore) -> Result<Self, ContainerError> {
        info!(backend = store.backend_name(), "Initializing validation container");

        // =====================================================================
        // PHASE 1-2: Storage
        // =====================================================================
        let store = Arc::new(store);
        let state = Arc::new(KvValidatorStateStore::new(Arc::clone(&store)));
        let certificates = Arc::new(KvCertificateStore::new(Arc::clone(&store)));
        let metadata = Arc::new(KvSignatureMetadataRepository::new(Arc::clone(&store)));
        let signing_state = Arc::new(KvPackageSigningStateStore::new(Arc::clone(&store)));

        // =====================================================================
        // PHASE 3: Queue
        // =====================================================================
        let queue = Arc::new(open_queue(&config, &store));
        let serializer = Arc::new(SignatureValidationMessageSerializer::new());

        // =====================================================================
        // PHASE 4: Extraction and verification
        // =====================================================================
        let extractor = Arc::new(SignaturePartsExtractor::new(
            Arc::clone(&certificates),
            Arc::clone(&metadata),
        ));
        let content = Arc::new(FileSystemPackageSource::new(&config.package_source.root));
        let minimal = Arc::new(MinimalPackageSignatureVerifier::new(
            config.verification.policy.clone(),
        ));
        let full = Arc::new(FullPackageSignatureVerifier::new(trust_store(&config)?));

        let validator = Arc::new(
            SignatureValidator::new(
                Arc::clone(&state),
                extractor,
                content,
                Arc::clone(&signing_state),
                minimal,
                full,
            )
            .with_download_timeout(config.package_source.download_timeout),
        );

        // =====================================================================
        // PHASE 5: Orchestrator
        // =====================================================================
        let enqueuer = Arc::new(QueueVerificationEnqueuer::new(
            Arc::clone(&queue),
            Arc::clone(&serializer),
        ));
        let orchestrator = Arc::new(
            PackageSigningValidator::new(Arc::clone(&state), enqueuer)
                .with_enqueue_claim_timeout(config.queue.enqueue_claim_timeout),
        );

        info!(
            signing_roots = config.verification.trusted_signing_roots.len(),
            timestamp_roots = config.verification.trusted_timestamp_roots.len(),
            allow_signed = config.verification.policy.allow_signed_packages,
            queue = queue.backend_name(),
            "Validation container ready"
        );

        Ok(Self {
            store,
            state,
            certificates,
            metadata,
            signing_state,
            queue,
            serializer,
            validator,
            orchestrator,
            config,
        })
    }

    /// A processor dispatching verification messages to the validator.
    pub fn processor(&self) -> ConcreteProcessor {
        SubscriptionProcessor::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.serializer),
            Arc::new(SignatureValidationMessageHandler::new(Arc::clone(
                &self.validator,
            ))),
            self.config.processor.processor_config(),
        )
    }
}
