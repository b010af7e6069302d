//! # Signed Package Layout
//!
//! ```text
//! ┌──────────────┬─────────────────┬──────────────┬────────────┐
//! │ content      │ signature block │ u32 LE len   │ "PKGSIG01" │
//! └──────────────┴─────────────────┴──────────────┴────────────┘
//! ```
//!
//! A package without the trailing magic is unsigned and its whole byte
//! stream is content.

use crate::domain::errors::ExtractionError;
use sha2::{Digest, Sha256};

/// Trailer magic marking a signed package.
pub const SIGNATURE_MAGIC: &[u8; 8] = b"PKGSIG01";

/// Length of the length field plus the magic.
pub const TRAILER_LEN: usize = 4 + SIGNATURE_MAGIC.len();

/// A package split into content and optional signature block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageParts<'a> {
    pub content: &'a [u8],
    pub signature_block: Option<&'a [u8]>,
}

impl PackageParts<'_> {
    pub fn is_signed(&self) -> bool {
        self.signature_block.is_some()
    }

    /// SHA-256 of the content.
    pub fn content_digest(&self) -> [u8; 32] {
        Sha256::digest(self.content).into()
    }
}

/// Split a package's bytes.
pub fn split_package(bytes: &[u8]) -> Result<PackageParts<'_>, ExtractionError> {
    if bytes.len() < TRAILER_LEN || !bytes.ends_with(SIGNATURE_MAGIC) {
        return Ok(PackageParts {
            content: bytes,
            signature_block: None,
        });
    }

    let len_start = bytes.len() - TRAILER_LEN;
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[len_start..len_start + 4]);
    let block_len = u32::from_le_bytes(len_bytes) as usize;

    if block_len == 0 || block_len > len_start {
        return Err(ExtractionError::MalformedSignature(format!(
            "signature block length {} exceeds package size",
            block_len
        )));
    }

    let block_start = len_start - block_len;
    Ok(PackageParts {
        content: &bytes[..block_start],
        signature_block: Some(&bytes[block_start..len_start]),
    })
}

/// Append a signature block to package content.
pub fn seal_package(content: &[u8], signature_block: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(content.len() + signature_block.len() + TRAILER_LEN);
    bytes.extend_from_slice(content);
    bytes.extend_from_slice(signature_block);
    bytes.extend_from_slice(&(signature_block.len() as u32).to_le_bytes());
    bytes.extend_from_slice(SIGNATURE_MAGIC);
    bytes
}
