//! Package bytes read from a local directory.

use async_trait::async_trait;
use pv_04_signature_validation::{ContentSourceError, PackageContentSource};
use shared_types::PackageKey;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Serves packages from `root`.
///
/// A content URL is a path relative to `root`. An empty URL falls back to
/// `{id}.{version}.pkg`.
#[derive(Debug, Clone)]
pub struct FileSystemPackageSource {
    root: PathBuf,
}

impl FileSystemPackageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_file_name(package_key: &PackageKey) -> String {
        format!("{}.{}.pkg", package_key.id, package_key.version)
    }

    fn resolve(&self, package_key: &PackageKey, content_url: &str) -> Result<PathBuf, ContentSourceError> {
        let relative = if content_url.is_empty() {
            PathBuf::from(Self::default_file_name(package_key))
        } else {
            PathBuf::from(content_url)
        };

        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ContentSourceError::Io(format!(
                "content path '{}' leaves the package root",
                content_url
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl PackageContentSource for FileSystemPackageSource {
    async fn fetch(
        &self,
        package_key: &PackageKey,
        content_url: &str,
    ) -> Result<Vec<u8>, ContentSourceError> {
        let path = self.resolve(package_key, content_url)?;
        debug!(package = %package_key, path = %path.display(), "Reading package");

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ContentSourceError::NotFound(package_key.to_string()),
            _ => ContentSourceError::Io(format!("{}: {}", path.display(), e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PackageKey {
        PackageKey::new("Contoso.Lib", "1.0.0")
    }

    /// Test: Explicit URL and default file name both resolve under the root
    #[tokio::test]
    async fn test_fetch_package() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/lib.pkg"), b"explicit").unwrap();
        std::fs::write(
            dir.path().join(FileSystemPackageSource::default_file_name(&key())),
            b"default",
        )
        .unwrap();

        let source = FileSystemPackageSource::new(dir.path());
        assert_eq!(source.fetch(&key(), "nested/lib.pkg").await.unwrap(), b"explicit");
        assert_eq!(source.fetch(&key(), "").await.unwrap(), b"default");
    }

    /// Test: Missing file is NotFound
    #[tokio::test]
    async fn test_missing_package() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSystemPackageSource::new(dir.path());
        assert!(matches!(
            source.fetch(&key(), "absent.pkg").await,
            Err(ContentSourceError::NotFound(_))
        ));
    }

    /// Test: Paths escaping the root are rejected
    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSystemPackageSource::new(dir.path());
        for url in ["../secret.pkg", "/etc/passwd"] {
            assert!(matches!(
                source.fetch(&key(), url).await,
                Err(ContentSourceError::Io(_))
            ));
        }
    }
}
