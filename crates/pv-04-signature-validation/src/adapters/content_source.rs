//! In-memory package content, for tests and local runs.

use crate::domain::ContentSourceError;
use crate::ports::outbound::PackageContentSource;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::PackageKey;
use std::collections::HashMap;

/// Packages addressed by content URL, falling back to the package key.
#[derive(Default)]
pub struct InMemoryPackageContentSource {
    by_url: RwLock<HashMap<String, Vec<u8>>>,
    by_key: RwLock<HashMap<PackageKey, Vec<u8>>>,
}

impl InMemoryPackageContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_url(&self, content_url: impl Into<String>, bytes: Vec<u8>) {
        self.by_url.write().insert(content_url.into(), bytes);
    }

    pub fn insert_package(&self, package_key: PackageKey, bytes: Vec<u8>) {
        self.by_key.write().insert(package_key, bytes);
    }
}

#[async_trait]
impl PackageContentSource for InMemoryPackageContentSource {
    async fn fetch(
        &self,
        package_key: &PackageKey,
        content_url: &str,
    ) -> Result<Vec<u8>, ContentSourceError> {
        if let Some(bytes) = self.by_url.read().get(content_url) {
            return Ok(bytes.clone());
        }
        self.by_key
            .read()
            .get(package_key)
            .cloned()
            .ok_or_else(|| ContentSourceError::NotFound(package_key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: URL lookup wins, key lookup is the fallback
    #[tokio::test]
    async fn test_lookup_order() {
        let source = InMemoryPackageContentSource::new();
        let key = PackageKey::new("Foo", "1.0.0");
        source.insert_package(key.clone(), b"by key".to_vec());
        source.insert_url("foo.pkg", b"by url".to_vec());

        assert_eq!(source.fetch(&key, "foo.pkg").await.unwrap(), b"by url");
        assert_eq!(source.fetch(&key, "").await.unwrap(), b"by key");
        assert!(matches!(
            source.fetch(&PackageKey::new("Bar", "1.0.0"), "").await,
            Err(ContentSourceError::NotFound(_))
        ));
    }
}
