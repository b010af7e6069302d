//! # Signature Parts Extractor
//!
//! Splits a package, decodes its signature block and certificates, stores
//! every certificate in the content-addressed certificate store and records
//! the signature metadata for the validation.
//!
//! Running twice on the same package is safe: certificates are
//! insert-if-absent and metadata is write-once.

use crate::domain::{
    parse_chain, split_package, ExtractionError, PrimarySignature, SignatureMetadata,
};
use crate::ports::inbound::{ExtractedSignature, ExtractionOutcome, SignatureExtraction};
use crate::ports::outbound::SignatureMetadataRepository;
use async_trait::async_trait;
use pv_02_certificate_store::CertificateStore;
use shared_types::PackageKey;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct SignaturePartsExtractor<C, R>
where
    C: CertificateStore,
    R: SignatureMetadataRepository,
{
    certificates: Arc<C>,
    metadata: Arc<R>,
}

impl<C, R> SignaturePartsExtractor<C, R>
where
    C: CertificateStore,
    R: SignatureMetadataRepository,
{
    pub fn new(certificates: Arc<C>, metadata: Arc<R>) -> Self {
        Self {
            certificates,
            metadata,
        }
    }

    async fn store_certificates(&self, encoded: &[Vec<u8>]) -> Result<usize, ExtractionError> {
        let mut stored = 0;
        for certificate in encoded {
            if self.certificates.put(certificate).await?.newly_stored {
                stored += 1;
            }
        }
        Ok(stored)
    }
}

#[async_trait]
impl<C, R> SignatureExtraction for SignaturePartsExtractor<C, R>
where
    C: CertificateStore + 'static,
    R: SignatureMetadataRepository + 'static,
{
    async fn extract(
        &self,
        validation_id: Uuid,
        package_key: &PackageKey,
        package: &[u8],
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let parts = split_package(package)?;
        let Some(block) = parts.signature_block else {
            debug!(validation_id = %validation_id, package = %package_key, "Package is unsigned");
            return Ok(ExtractionOutcome::Unsigned);
        };

        // Decode everything before persisting anything
        let signature = PrimarySignature::decode(block)?;
        let signing_chain = parse_chain(&signature.certificates)?;
        let timestamp_chain = signature
            .timestamp
            .as_ref()
            .map(|token| parse_chain(&token.certificates))
            .transpose()?;

        let mut certificates_stored = self.store_certificates(&signature.certificates).await?;
        if let Some(token) = &signature.timestamp {
            certificates_stored += self.store_certificates(&token.certificates).await?;
        }

        let metadata = SignatureMetadata::new(
            validation_id,
            package_key.clone(),
            &signature,
            &signing_chain,
            timestamp_chain.as_deref(),
        );
        let metadata_written = self.metadata.save(&metadata)?;

        info!(
            validation_id = %validation_id,
            package = %package_key,
            signature_type = %signature.signature_type,
            chain_length = signing_chain.len(),
            timestamped = timestamp_chain.is_some(),
            certificates_stored,
            metadata_written,
            "Extracted signature parts"
        );

        Ok(ExtractionOutcome::Signed(Box::new(ExtractedSignature {
            actual_content_digest: parts.content_digest(),
            signature,
            signing_chain,
            timestamp_chain,
            metadata,
            certificates_stored,
            metadata_written,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::KvSignatureMetadataRepository;
    use crate::domain::{seal_package, SignatureType};
    use crate::signing::{seed_from, CertificateIssuer, PackageSigner};
    use pv_01_validator_state::InMemoryKVStore;
    use pv_02_certificate_store::KvCertificateStore;

    type TestExtractor =
        SignaturePartsExtractor<KvCertificateStore<InMemoryKVStore>, KvSignatureMetadataRepository<InMemoryKVStore>>;

    fn extractor() -> (
        TestExtractor,
        Arc<KvCertificateStore<InMemoryKVStore>>,
        Arc<KvSignatureMetadataRepository<InMemoryKVStore>>,
    ) {
        let kv = Arc::new(InMemoryKVStore::new());
        let certs = Arc::new(KvCertificateStore::new(kv.clone()));
        let metadata = Arc::new(KvSignatureMetadataRepository::new(kv));
        (
            SignaturePartsExtractor::new(certs.clone(), metadata.clone()),
            certs,
            metadata,
        )
    }

    fn signed_package(content: &[u8]) -> Vec<u8> {
        let root = CertificateIssuer::root_from_name("CN=Root", 0, 10_000);
        let leaf = root.issue("CN=Contoso", seed_from("contoso"), 2, 0, 10_000, false);
        PackageSigner::new(&leaf)
            .with_chain_certificate(&root)
            .unwrap()
            .sign_package(content, 5_000)
            .unwrap()
    }

    /// Test: Unsigned package persists nothing
    #[tokio::test]
    async fn test_unsigned_package() {
        let (extractor, certs, metadata) = extractor();
        let id = Uuid::new_v4();
        let outcome = extractor
            .extract(id, &PackageKey::new("Foo", "1.0.0"), b"plain content")
            .await
            .unwrap();

        assert!(matches!(outcome, ExtractionOutcome::Unsigned));
        assert_eq!(certs.count().unwrap(), 0);
        assert!(metadata.get(id).unwrap().is_none());
    }

    /// Test: Signed package stores its chain and metadata
    #[tokio::test]
    async fn test_signed_package() {
        let (extractor, certs, metadata) = extractor();
        let id = Uuid::new_v4();
        let key = PackageKey::new("Foo", "1.0.0");

        let outcome = extractor
            .extract(id, &key, &signed_package(b"content"))
            .await
            .unwrap();
        let ExtractionOutcome::Signed(extracted) = outcome else {
            panic!("expected a signed outcome");
        };

        assert_eq!(extracted.certificates_stored, 2);
        assert!(extracted.metadata_written);
        assert_eq!(extracted.signature.signature_type, SignatureType::Author);
        assert_eq!(extracted.actual_content_digest, extracted.signature.content_digest);
        assert_eq!(certs.count().unwrap(), 2);

        let record = metadata.get(id).unwrap().unwrap();
        assert_eq!(record.signing_chain[0].subject, "CN=Contoso");
        assert_eq!(metadata.for_package(&key).unwrap(), vec![record]);
    }

    /// Test: Re-extraction does not duplicate certificates or metadata
    #[tokio::test]
    async fn test_reextraction_idempotent() {
        let (extractor, certs, metadata) = extractor();
        let id = Uuid::new_v4();
        let key = PackageKey::new("Foo", "1.0.0");
        let package = signed_package(b"content");

        extractor.extract(id, &key, &package).await.unwrap();
        let first = metadata.get(id).unwrap();

        let again = extractor.extract(id, &key, &package).await.unwrap();
        let ExtractionOutcome::Signed(extracted) = again else {
            panic!("expected a signed outcome");
        };
        assert_eq!(extracted.certificates_stored, 0);
        assert!(!extracted.metadata_written);
        assert_eq!(certs.count().unwrap(), 2);
        assert_eq!(metadata.get(id).unwrap(), first);
        assert_eq!(metadata.for_package(&key).unwrap().len(), 1);
    }

    /// Test: Certificates shared by two packages are stored once
    #[tokio::test]
    async fn test_shared_certificates_stored_once() {
        let (extractor, certs, _) = extractor();
        extractor
            .extract(Uuid::new_v4(), &PackageKey::new("Foo", "1.0.0"), &signed_package(b"a"))
            .await
            .unwrap();
        extractor
            .extract(Uuid::new_v4(), &PackageKey::new("Bar", "2.0.0"), &signed_package(b"b"))
            .await
            .unwrap();
        assert_eq!(certs.count().unwrap(), 2);
    }

    /// Test: Garbage signature block is a permanent error and persists nothing
    #[tokio::test]
    async fn test_malformed_block() {
        let (extractor, certs, metadata) = extractor();
        let id = Uuid::new_v4();
        let package = seal_package(b"content", b"definitely not bincode");

        let err = extractor
            .extract(id, &PackageKey::new("Foo", "1.0.0"), &package)
            .await
            .unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(certs.count().unwrap(), 0);
        assert!(metadata.get(id).unwrap().is_none());
    }
}
