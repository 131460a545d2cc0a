//! Snapshot history persistence
//!
//! Each destination directory holds one `metadata.json` file with the full,
//! ordered list of backups:
//! ```text
//! destination/
//!   metadata.json
//!   2024-05-01_10-00-00.000000/
//!   2024-05-01_10-03-12.512004/
//! ```
//! Every save rewrites the whole list; the file is never appended to.

use crate::backup::Backup;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::debug;

/// File name of the history file inside a destination
pub const METADATA_FILE: &str = "metadata.json";

/// Errors reading or writing snapshot history
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is a directory, expected a metadata file", path.display())]
    NotAFile { path: PathBuf },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize snapshot history: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Loads and saves the snapshot history of destination directories
///
/// Writers to the same destination are serialized through a per-destination
/// lock, so callers never need their own locking around `save`.
#[derive(Default)]
pub struct MetadataStore {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl MetadataStore {
    /// Create a store with an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide store shared by all watchers
    pub fn global() -> &'static MetadataStore {
        static GLOBAL: OnceLock<MetadataStore> = OnceLock::new();
        GLOBAL.get_or_init(MetadataStore::new)
    }

    /// Path of the history file for a destination
    pub fn metadata_path(destination: &Path) -> PathBuf {
        destination.join(METADATA_FILE)
    }

    /// Load the history of a destination
    ///
    /// A missing file is an empty history; anything unreadable is an error.
    pub fn load(&self, destination: &Path) -> Result<Vec<Backup>, StoreError> {
        let lock = self.lock_for(destination);
        let _guard = lock.lock();

        let path = Self::metadata_path(destination);
        if path.is_dir() {
            return Err(StoreError::NotAFile { path });
        }

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let backups: Vec<Backup> =
            serde_json::from_slice(&data).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?;

        debug!("Loaded {} backups from {}", backups.len(), path.display());
        Ok(backups)
    }

    /// Replace the history of a destination with `backups`
    pub fn save(&self, destination: &Path, backups: &[Backup]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(backups).map_err(StoreError::Serialize)?;

        let lock = self.lock_for(destination);
        let _guard = lock.lock();

        let path = Self::metadata_path(destination);
        if path.is_dir() {
            return Err(StoreError::NotAFile { path });
        }

        atomic_write(destination, &path, &data)
            .map_err(|source| StoreError::Write { path: path.clone(), source })?;

        debug!("Saved {} backups to {}", backups.len(), path.display());
        Ok(())
    }

    fn lock_for(&self, destination: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(destination.to_path_buf())
            .or_default()
            .value()
            .clone()
    }
}

/// Atomic write helper
///
/// Writes data to a temporary file in `tmp_dir`, fsyncs it, then renames it to
/// the target path. Readers see either the old or the new content, never a
/// truncated file.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(tmp_dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;

    // Directory fsync makes the rename itself durable
    #[cfg(unix)]
    {
        fs::File::open(tmp_dir)?.sync_all()?;
    }

    Ok(())
}
