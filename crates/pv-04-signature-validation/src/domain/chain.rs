//! # Chain Building
//!
//! Ed25519 signature checks and issuer-chain validation. Pure functions over
//! decoded certificates.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use pv_02_certificate_store::Thumbprint;
use pv_03_signature_extraction::ParsedCertificate;

/// Verify an Ed25519 signature. Malformed keys or signatures verify as false.
pub fn verify_ed25519(public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

/// Why a chain is not trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainFault {
    Empty,
    /// Certificate at `index` is not issued by the next one.
    BrokenLink { index: usize },
    /// The certificate at `index` issues others but is not a CA.
    IssuerNotCa { index: usize },
    /// The last certificate is not a valid self-signed root.
    NotSelfSigned,
    /// The root is valid but not in the trusted set.
    UntrustedRoot(Thumbprint),
}

impl ChainFault {
    pub fn describe(&self) -> String {
        match self {
            ChainFault::Empty => "certificate chain is empty".to_string(),
            ChainFault::BrokenLink { index } => {
                format!("certificate {} is not issued by the next certificate", index)
            }
            ChainFault::IssuerNotCa { index } => {
                format!("certificate {} issues certificates but is not a CA", index)
            }
            ChainFault::NotSelfSigned => "chain does not end in a self-signed root".to_string(),
            ChainFault::UntrustedRoot(thumbprint) => format!("root {} is not trusted", thumbprint),
        }
    }
}

/// Check that each certificate is issued by the next, and that the last one
/// is a self-signed root accepted by `is_trusted_root`.
pub fn verify_chain(
    chain: &[ParsedCertificate],
    is_trusted_root: impl Fn(&Thumbprint) -> bool,
) -> Result<(), ChainFault> {
    let root = chain.last().ok_or(ChainFault::Empty)?;

    for (index, pair) in chain.windows(2).enumerate() {
        let (subject, issuer) = (&pair[0], &pair[1]);
        if !issuer.info.is_ca {
            return Err(ChainFault::IssuerNotCa { index: index + 1 });
        }
        let linked = subject.info.issuer == issuer.info.subject
            && verify_ed25519(
                &issuer.info.public_key,
                &subject.info.tbs_bytes(),
                &subject.info.signature,
            );
        if !linked {
            return Err(ChainFault::BrokenLink { index });
        }
    }

    let self_signed = root.info.is_self_issued()
        && verify_ed25519(
            &root.info.public_key,
            &root.info.tbs_bytes(),
            &root.info.signature,
        );
    if !self_signed {
        return Err(ChainFault::NotSelfSigned);
    }
    if !is_trusted_root(&root.thumbprint) {
        return Err(ChainFault::UntrustedRoot(root.thumbprint.clone()));
    }
    Ok(())
}

/// First certificate not valid at `at` (unix seconds).
pub fn first_invalid_at(chain: &[ParsedCertificate], at: i64) -> Option<&ParsedCertificate> {
    chain.iter().find(|cert| !cert.info.is_valid_at(at))
}
