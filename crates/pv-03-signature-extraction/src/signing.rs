//! # Package Signing
//!
//! Producer side of the signed package format: issue certificates, sign
//! package content, countersign with a timestamp authority. Used by tooling
//! that prepares packages and by test fixtures.

use crate::domain::{
    seal_package, CertificateInfo, ExtractionError, PrimarySignature, SignatureType,
    TimestampToken,
};
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};

/// A named key that can issue certificates and sign.
pub struct CertificateIssuer {
    name: String,
    key: SigningKey,
    certificate: CertificateInfo,
}

impl CertificateIssuer {
    /// Self-signed root (or timestamp root) valid in `[not_before, not_after]`.
    pub fn root(name: &str, seed: [u8; 32], not_before: i64, not_after: i64) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let mut certificate = CertificateInfo {
            serial: 1,
            subject: name.to_string(),
            issuer: name.to_string(),
            public_key: key.verifying_key().to_bytes(),
            not_before,
            not_after,
            is_ca: true,
            signature: Vec::new(),
        };
        certificate.signature = key.sign(&certificate.tbs_bytes()).to_bytes().to_vec();
        Self {
            name: name.to_string(),
            key,
            certificate,
        }
    }

    /// Root whose key is derived from its name. Deterministic.
    pub fn root_from_name(name: &str, not_before: i64, not_after: i64) -> Self {
        Self::root(name, seed_from(name), not_before, not_after)
    }

    /// Issue a certificate for `subject` signed by this issuer.
    pub fn issue(
        &self,
        subject: &str,
        seed: [u8; 32],
        serial: u64,
        not_before: i64,
        not_after: i64,
        is_ca: bool,
    ) -> CertificateIssuer {
        let key = SigningKey::from_bytes(&seed);
        let mut certificate = CertificateInfo {
            serial,
            subject: subject.to_string(),
            issuer: self.name.clone(),
            public_key: key.verifying_key().to_bytes(),
            not_before,
            not_after,
            is_ca,
            signature: Vec::new(),
        };
        certificate.signature = self.key.sign(&certificate.tbs_bytes()).to_bytes().to_vec();
        CertificateIssuer {
            name: subject.to_string(),
            key,
            certificate,
        }
    }

    pub fn certificate(&self) -> &CertificateInfo {
        &self.certificate
    }

    pub fn encoded_certificate(&self) -> Result<Vec<u8>, ExtractionError> {
        self.certificate.encode()
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key.sign(message).to_bytes().to_vec()
    }
}

/// Deterministic 32-byte seed from a label.
pub fn seed_from(label: &str) -> [u8; 32] {
    Sha256::digest(label.as_bytes()).into()
}

/// Signs package content with a leaf issuer and its chain.
pub struct PackageSigner<'a> {
    leaf: &'a CertificateIssuer,
    /// Encoded certificates above the leaf, in order.
    chain: Vec<Vec<u8>>,
    signature_type: SignatureType,
}

impl<'a> PackageSigner<'a> {
    pub fn new(leaf: &'a CertificateIssuer) -> Self {
        Self {
            leaf,
            chain: Vec::new(),
            signature_type: SignatureType::Author,
        }
    }

    /// Append an issuer certificate to the chain (intermediate, then root).
    pub fn with_chain_certificate(mut self, issuer: &CertificateIssuer) -> Result<Self, ExtractionError> {
        self.chain.push(issuer.encoded_certificate()?);
        Ok(self)
    }

    pub fn with_signature_type(mut self, signature_type: SignatureType) -> Self {
        self.signature_type = signature_type;
        self
    }

    /// Build the signature block for `content`.
    pub fn signature(&self, content: &[u8], signed_at: i64) -> Result<PrimarySignature, ExtractionError> {
        let mut certificates = vec![self.leaf.encoded_certificate()?];
        certificates.extend(self.chain.iter().cloned());

        let mut signature = PrimarySignature {
            signature_type: self.signature_type,
            content_digest: Sha256::digest(content).into(),
            signed_at,
            signature: Vec::new(),
            certificates,
            timestamp: None,
        };
        signature.signature = self.leaf.sign(&signature.signed_attributes());
        Ok(signature)
    }

    /// Signed package bytes.
    pub fn sign_package(&self, content: &[u8], signed_at: i64) -> Result<Vec<u8>, ExtractionError> {
        let signature = self.signature(content, signed_at)?;
        Ok(seal_package(content, &signature.encode()?))
    }

    /// Signed package bytes countersigned by `tsa` (chain: `tsa` then `tsa_chain`).
    pub fn sign_package_timestamped(
        &self,
        content: &[u8],
        signed_at: i64,
        tsa: &CertificateIssuer,
        tsa_chain: &[&CertificateIssuer],
        generated_at: i64,
    ) -> Result<Vec<u8>, ExtractionError> {
        let mut signature = self.signature(content, signed_at)?;

        let mut certificates = vec![tsa.encoded_certificate()?];
        for issuer in tsa_chain {
            certificates.push(issuer.encoded_certificate()?);
        }
        signature.timestamp = Some(TimestampToken {
            generated_at,
            signature: tsa.sign(&signature.timestamp_message(generated_at)),
            certificates,
        });

        Ok(seal_package(content, &signature.encode()?))
    }
}
