use crate::adapters::lock::StoreLock;
use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{KeyValueStore, ScanResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// File-backed key-value store for single-node deployments.
///
/// Every write rewrites the file through a temp file and an atomic rename, so
/// the file on disk is always a complete snapshot. The store holds an
/// exclusive lock file for as long as it is open.
pub struct FileBackedKVStore {
    data: Mutex<Entries>,
    path: PathBuf,
    _lock: StoreLock,
}

impl FileBackedKVStore {
    /// Open (or create) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();
        let lock = StoreLock::acquire(&path)?;

        let data = match std::fs::read(&path) {
            Ok(bytes) => decode_entries(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(e) => {
                return Err(KVStoreError::IOError {
                    message: e.to_string(),
                })
            }
        };

        info!(path = %path.display(), keys = data.len(), "Opened file-backed store");

        Ok(Self {
            data: Mutex::new(data),
            path,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a single-key change and persist it. Memory is rolled back if the
    /// file cannot be written.
    fn write_key(&self, key: &[u8], value: Option<&[u8]>) -> Result<(), KVStoreError> {
        let mut data = self.data.lock();
        let previous = match value {
            Some(v) => data.insert(key.to_vec(), v.to_vec()),
            None => data.remove(key),
        };

        if let Err(e) = self.save(&data) {
            match previous {
                Some(p) => data.insert(key.to_vec(), p),
                None => data.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn save(&self, data: &Entries) -> Result<(), KVStoreError> {
        use std::io::Write;

        let io = |e: std::io::Error| KVStoreError::IOError {
            message: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io)?;
        file.write_all(&encode_entries(data)).map_err(io)?;
        file.sync_all().map_err(io)?;
        std::fs::rename(&temp_path, &self.path).map_err(io)?;
        Ok(())
    }
}

/// `[key_len:u32][key][value_len:u32][value]...`
fn encode_entries(data: &Entries) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (key, value) in data {
        bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
        bytes.extend_from_slice(value);
    }
    bytes
}

fn decode_entries(bytes: &[u8]) -> Result<Entries, KVStoreError> {
    let corrupt = |what: &str, at: usize| KVStoreError::CorruptionError {
        message: format!("truncated {} at offset {}", what, at),
    };

    let mut data = Entries::new();
    let mut cursor = 0;
    while cursor < bytes.len() {
        let key = read_chunk(bytes, &mut cursor).ok_or_else(|| corrupt("key", cursor))?;
        let value = read_chunk(bytes, &mut cursor).ok_or_else(|| corrupt("value", cursor))?;
        data.insert(key, value);
    }
    Ok(data)
}

fn read_chunk(bytes: &[u8], cursor: &mut usize) -> Option<Vec<u8>> {
    let len_bytes: [u8; 4] = bytes.get(*cursor..*cursor + 4)?.try_into().ok()?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    let start = *cursor + 4;
    let chunk = bytes.get(start..start + len)?.to_vec();
    *cursor = start + len;
    Some(chunk)
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.write_key(key, Some(value))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.write_key(key, None)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.lock().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        Ok(self
            .data
            .lock()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, KVStoreError> {
        let mut data = self.data.lock();
        if data.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }

        let previous = data.insert(key.to_vec(), new.to_vec());
        if let Err(e) = self.save(&data) {
            match previous {
                Some(p) => data.insert(key.to_vec(), p),
                None => data.remove(key),
            };
            return Err(e);
        }
        Ok(true)
    }
}
