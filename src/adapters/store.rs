//! Last-open persistence.
//!
//! [`FileLastOpenStore`] keeps the whole `door id → epoch` table in memory
//! and rewrites it on every change as a postcard blob.  Writes go to a
//! sibling temp file that is renamed over the target, so a crash leaves
//! either the old table or the new one.
//!
//! [`MemoryStore`] is the volatile variant.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::LastOpenStore;
use crate::error::StorageError;

pub struct FileLastOpenStore {
    path: PathBuf,
    table: BTreeMap<String, f64>,
}

impl FileLastOpenStore {
    /// Open (or start) the table at `path`.
    ///
    /// A missing file is an empty table.  An unreadable or corrupt file is
    /// reported; callers may fall back to [`FileLastOpenStore::empty`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let table = match fs::read(&path) {
            Ok(bytes) => postcard::from_bytes(&bytes).map_err(|_| StorageError::Corrupted)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(_) => return Err(StorageError::IoError),
        };
        info!("last-open store {}: {} doors", path.display(), table.len());
        Ok(Self { path, table })
    }

    /// Fresh table at `path`; the first write replaces whatever is there.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(&self.table).map_err(|_| StorageError::IoError)?;
        let tmp = self.path.with_extension("tmp");
        let write = || -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            warn!("last-open store {}: {e}", self.path.display());
            StorageError::IoError
        })
    }
}

impl LastOpenStore for FileLastOpenStore {
    fn get_last_open_time(&self, door_id: &str) -> Result<Option<f64>, StorageError> {
        Ok(self.table.get(door_id).copied())
    }

    fn set_last_open_time(&mut self, door_id: &str, at: f64) -> Result<(), StorageError> {
        self.table.insert(door_id.to_string(), at);
        self.flush()
    }
}

/// Volatile table.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    table: BTreeMap<String, f64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LastOpenStore for MemoryStore {
    fn get_last_open_time(&self, door_id: &str) -> Result<Option<f64>, StorageError> {
        Ok(self.table.get(door_id).copied())
    }

    fn set_last_open_time(&mut self, door_id: &str, at: f64) -> Result<(), StorageError> {
        self.table.insert(door_id.to_string(), at);
        Ok(())
    }
}
