//! Adapters layer.

pub mod metadata_repository;

pub use metadata_repository::KvSignatureMetadataRepository;
