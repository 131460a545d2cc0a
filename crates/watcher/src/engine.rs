//! Snapshot engine: copy the source tree into a new timestamped folder
//!
//! One run is one snapshot attempt:
//! 1. Name the folder by rendering the folder format at the current local time
//! 2. Skip the run if that folder already exists (collision guard)
//! 3. Copy the tree, retrying with a fixed delay and cleaning partial copies
//! 4. On success append a record to the history sink, which persists it
//!
//! Runs are blocking; callers move them off the async runtime.

use crate::copy::TreeCopier;
use chrono::{DateTime, Local};
use isawthat_core::{Backup, FolderFormat, FormatError, StoreError, ValidatedConfig};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

/// Copy attempts before a snapshot is abandoned
pub const DEFAULT_COPY_ATTEMPTS: u32 = 100;

/// Pause between copy attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// How hard to try copying a tree whose files may be changing underneath us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_COPY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Where a snapshot comes from and goes to
#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub format: FolderFormat,
}

impl SnapshotSettings {
    pub fn from_config(config: &ValidatedConfig) -> Self {
        Self {
            source: config.source().to_path_buf(),
            destination: config.destination().to_path_buf(),
            format: config.folder_format().clone(),
        }
    }
}

/// Receives each successful snapshot record
pub trait HistorySink {
    /// Append `backup` to the history and persist it
    fn record(&self, backup: Backup) -> Result<(), StoreError>;
}

/// Result of one snapshot attempt
#[derive(Debug)]
pub enum SnapshotOutcome {
    /// Copy succeeded and the record was appended
    Recorded(Backup),
    /// Target folder already existed; nothing was copied
    Collision { target: PathBuf },
    /// Every copy attempt failed; nothing was recorded
    CopyFailed {
        target: PathBuf,
        attempts: u32,
        error: io::Error,
    },
    /// The folder format could not be rendered
    FormatFailed(FormatError),
}

impl SnapshotOutcome {
    /// Whether the run got as far as copying
    ///
    /// Observers are notified exactly for these outcomes.
    pub fn attempted(&self) -> bool {
        matches!(self, Self::Recorded(_) | Self::CopyFailed { .. })
    }

    pub fn backup(&self) -> Option<&Backup> {
        match self {
            Self::Recorded(backup) => Some(backup),
            _ => None,
        }
    }
}

/// Performs snapshot runs with a given copier and retry policy
pub struct SnapshotEngine {
    copier: Arc<dyn TreeCopier>,
    retry: RetryPolicy,
}

impl SnapshotEngine {
    pub fn new(copier: Arc<dyn TreeCopier>, retry: RetryPolicy) -> Self {
        Self { copier, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Take one snapshot of `settings.source`
    pub fn run(&self, settings: &SnapshotSettings, sink: &dyn HistorySink) -> SnapshotOutcome {
        let started = SystemTime::now();
        let local: DateTime<Local> = started.into();

        let folder = match settings.format.render(&local) {
            Ok(folder) => folder,
            Err(e) => {
                error!("Cannot name snapshot folder: {}", e);
                return SnapshotOutcome::FormatFailed(e);
            }
        };

        let target = settings.destination.join(&folder);
        if fs::symlink_metadata(&target).is_ok() {
            warn!(
                "Backup folder {} already exists, skipping this snapshot",
                target.display()
            );
            return SnapshotOutcome::Collision { target };
        }

        info!("Creating backup at {}", target.display());

        if let Err((attempts, error)) = self.copy_with_retry(&settings.source, &target) {
            error!(
                "Giving up on backup {} after {} attempts: {}",
                target.display(),
                attempts,
                error
            );
            return SnapshotOutcome::CopyFailed {
                target,
                attempts,
                error,
            };
        }

        let backup = Backup::at(started, folder);
        if let Err(e) = sink.record(backup.clone()) {
            error!("Error saving metadata for {}: {}", target.display(), e);
        }

        info!("Backup created successfully at {}", target.display());
        SnapshotOutcome::Recorded(backup)
    }

    fn copy_with_retry(&self, source: &Path, target: &Path) -> Result<u32, (u32, io::Error)> {
        let attempts = self.retry.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.copier.copy_tree(source, target) {
                Ok(()) => {
                    if attempt > 1 {
                        debug!("Copy to {} succeeded on attempt {}", target.display(), attempt);
                    }
                    return Ok(attempt);
                }
                Err(e) => {
                    warn!(
                        "Error copying {} to {} (attempt {}/{}): {}",
                        source.display(),
                        target.display(),
                        attempt,
                        attempts,
                        e
                    );
                    remove_partial(target);
                    last_error = Some(e);
                    if attempt < attempts {
                        thread::sleep(self.retry.delay);
                    }
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "copy was never attempted"));
        Err((attempts, error))
    }
}

fn remove_partial(target: &Path) {
    let result = match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target),
        Ok(_) => fs::remove_file(target),
        Err(_) => return,
    };
    if let Err(e) = result {
        warn!("Could not remove partial copy {}: {}", target.display(), e);
    }
}
