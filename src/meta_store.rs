//! Flush watermark stores.

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::constants::META_FILE_EXTENSION;
use crate::FlushMetaStore;
use crate::Result;
use crate::StorageError;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct MetaRecord {
    last_flushed_index: u64,
    checksum: u32,
}

impl MetaRecord {
    fn new(last_flushed_index: u64) -> Self {
        Self {
            last_flushed_index,
            checksum: crc32fast::hash(&last_flushed_index.to_le_bytes()),
        }
    }

    fn is_valid(&self) -> bool {
        self.checksum == crc32fast::hash(&self.last_flushed_index.to_le_bytes())
    }
}

/// Keeps the flush watermark in `{directory}/{name}.meta`.
///
/// Updates are written to a temporary file and renamed over the previous one.
#[derive(Debug)]
pub struct FileMetaStore {
    path: PathBuf,
    last_flushed_index: AtomicU64,
    write_lock: Mutex<()>,
}

impl FileMetaStore {
    /// Opens the store, loading the persisted watermark. A missing or
    /// unreadable meta file yields a watermark of 0.
    pub fn open(
        directory: &Path,
        name: &str,
    ) -> Result<Self> {
        fs::create_dir_all(directory).map_err(|source| StorageError::PathError {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = directory.join(format!("{name}.{META_FILE_EXTENSION}"));
        let last_flushed_index = Self::load(&path)?;
        debug!(path = %path.display(), last_flushed_index, "Opened meta store");

        Ok(Self {
            path,
            last_flushed_index: AtomicU64::new(last_flushed_index),
            write_lock: Mutex::new(()),
        })
    }

    fn load(path: &Path) -> Result<u64> {
        if !path.exists() {
            return Ok(0);
        }
        let bytes = fs::read(path).map_err(|source| StorageError::PathError {
            path: path.to_path_buf(),
            source,
        })?;
        match bincode::deserialize::<MetaRecord>(&bytes) {
            Ok(record) if record.is_valid() => Ok(record.last_flushed_index),
            _ => {
                warn!(path = %path.display(), "Ignoring corrupted meta file");
                Ok(0)
            }
        }
    }

    pub fn last_flushed_index(&self) -> u64 {
        self.last_flushed_index.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FlushMetaStore for FileMetaStore {
    fn store_last_flushed_index(
        &self,
        index: u64,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();
        let bytes = bincode::serialize(&MetaRecord::new(index))?;

        let tmp_path = self.path.with_extension(format!("{META_FILE_EXTENSION}.tmp"));
        let mut file = File::create(&tmp_path).map_err(|source| StorageError::PathError {
            path: tmp_path.clone(),
            source,
        })?;
        file.write_all(&bytes)?;
        file.sync_data()?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StorageError::PathError {
            path: self.path.clone(),
            source,
        })?;

        self.last_flushed_index.store(index, Ordering::Release);
        Ok(())
    }
}

/// Volatile watermark for logs without a directory.
#[derive(Debug, Default)]
pub struct InMemoryMetaStore {
    last_flushed_index: AtomicU64,
}

impl InMemoryMetaStore {
    pub fn last_flushed_index(&self) -> u64 {
        self.last_flushed_index.load(Ordering::Acquire)
    }
}

impl FlushMetaStore for InMemoryMetaStore {
    fn store_last_flushed_index(
        &self,
        index: u64,
    ) -> Result<()> {
        self.last_flushed_index.store(index, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_watermark_survives_reopen() {
        let dir = tempdir().unwrap();
        let store = FileMetaStore::open(dir.path(), "raft").unwrap();
        assert_eq!(store.last_flushed_index(), 0);

        store.store_last_flushed_index(42).unwrap();
        store.store_last_flushed_index(57).unwrap();
        assert_eq!(store.last_flushed_index(), 57);
        assert!(dir.path().join("raft.meta").exists());
        drop(store);

        let reopened = FileMetaStore::open(dir.path(), "raft").unwrap();
        assert_eq!(reopened.last_flushed_index(), 57);
    }

    #[test]
    fn test_corrupted_meta_file_resets_watermark() {
        let dir = tempdir().unwrap();
        let store = FileMetaStore::open(dir.path(), "raft").unwrap();
        store.store_last_flushed_index(9).unwrap();

        let mut bytes = fs::read(store.path()).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(store.path(), bytes).unwrap();

        assert_eq!(FileMetaStore::open(dir.path(), "raft").unwrap().last_flushed_index(), 0);
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryMetaStore::default();
        store.store_last_flushed_index(3).unwrap();
        assert_eq!(store.last_flushed_index(), 3);
    }
}
