//! # Store Lock
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on
//! Windows). A file-backed store is single-writer: a second process opening
//! the same file must fail instead of silently diverging.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::domain::errors::KVStoreError;

/// Exclusive lock next to a store file, released on drop.
pub struct StoreLock {
    /// The lock file handle (kept open to maintain lock)
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Lock `<store_path>.lock` without blocking.
    pub fn acquire(store_path: &Path) -> Result<Self, KVStoreError> {
        let path = store_path.with_extension("lock");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KVStoreError::IOError {
                message: e.to_string(),
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| KVStoreError::IOError {
                message: e.to_string(),
            })?;

        file.try_lock_exclusive()
            .map_err(|_| KVStoreError::Locked {
                message: format!("{} is held by another process", path.display()),
            })?;

        // Best effort: record the holder for operators
        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        #[allow(clippy::incompatible_msrv)]
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}
