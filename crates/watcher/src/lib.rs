//! Debounced snapshot watchers for I Saw That
//!
//! A [`Watcher`] subscribes to recursive change notifications on a source
//! tree. Once the tree has been quiet for the configured wait time it copies
//! the whole tree into a new timestamped folder of the destination, appends a
//! record to the destination's `metadata.json` and notifies its observers.
//!
//! A watcher should be stopped with [`Watcher::stop`], which waits for an
//! in-flight snapshot. Dropping every handle instead shuts the watcher down in
//! the background.
//!
//! ```no_run
//! # async fn demo() -> Result<(), isawthat_watcher::WatcherError> {
//! use isawthat_core::WatcherConfig;
//! use isawthat_watcher::Watcher;
//!
//! let watcher = Watcher::new(WatcherConfig::new("notes", "/home/me/notes", "/backups/notes"))?;
//! watcher.start().await?;
//! // ...
//! watcher.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod copy;
pub mod debounce;
pub mod engine;
pub mod observer;
pub mod source;

pub use copy::{FsCopier, TreeCopier};
pub use engine::{
    HistorySink, RetryPolicy, SnapshotEngine, SnapshotOutcome, SnapshotSettings,
    DEFAULT_COPY_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
pub use observer::{BackupObserver, ObserverRegistry};
pub use source::{ChangeEvent, ChangeSource, EventKind, NotifySource, SourceError, Subscription};

use debounce::{forward_changes, DebounceLoop};
use isawthat_core::{
    compare_trees, Backup, MetadataStore, StoreError, TreeComparison, ValidatedConfig,
    ValidationErrors, WatcherConfig,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Errors from constructing or driving a watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("invalid watcher configuration: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("failed to load snapshot history: {0}")]
    History(#[from] StoreError),

    #[error("watcher {0:?} is disabled")]
    Disabled(String),

    #[error("watcher {0:?} is already running")]
    AlreadyRunning(String),

    #[error("watcher {0:?} is not running")]
    NotRunning(String),

    #[error("failed to subscribe to changes: {0}")]
    Subscribe(#[source] SourceError),

    #[error("watcher task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Lifecycle state of a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Constructed, never started
    Created,
    /// Subscribed and debouncing
    Running,
    /// Stopped; may be started again
    Stopped,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

enum RunState {
    Created,
    Running(Running),
    Stopped,
}

struct Running {
    shutdown: watch::Sender<bool>,
    mailbox: mpsc::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    config: ValidatedConfig,
    history: RwLock<Vec<Backup>>,
    observers: ObserverRegistry,
    store: &'static MetadataStore,
    source: Arc<dyn ChangeSource>,
    engine: Arc<SnapshotEngine>,
    run: Mutex<RunState>,
    /// Held by `start` and `stop` until they finish; a restart waits for the
    /// previous tasks to be joined
    lifecycle: tokio::sync::Mutex<()>,
}

/// Handle to one watcher; clones share the same watcher
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<Inner>,
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("name", &self.name())
            .field("source", &self.inner.config.source())
            .field("destination", &self.inner.config.destination())
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for watchers with non-default collaborators
pub struct WatcherBuilder {
    config: WatcherConfig,
    source: Arc<dyn ChangeSource>,
    copier: Arc<dyn TreeCopier>,
    retry: RetryPolicy,
}

impl WatcherBuilder {
    /// Use a different change-notification source
    pub fn change_source(mut self, source: Arc<dyn ChangeSource>) -> Self {
        self.source = source;
        self
    }

    /// Use a different tree copier
    pub fn copier(mut self, copier: Arc<dyn TreeCopier>) -> Self {
        self.copier = copier;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate the configuration and load the destination's history
    ///
    /// Validation runs first; history is only read for a valid configuration.
    pub fn build(self) -> Result<Watcher, WatcherError> {
        let config = self.config.validate()?;
        let store = MetadataStore::global();
        let history = store.load(config.destination())?;

        info!(
            "{}: Loaded {} backups from {}",
            config.name(),
            history.len(),
            config.destination().display()
        );

        Ok(Watcher {
            inner: Arc::new(Inner {
                config,
                history: RwLock::new(history),
                observers: ObserverRegistry::new(),
                store,
                source: self.source,
                engine: Arc::new(SnapshotEngine::new(self.copier, self.retry)),
                run: Mutex::new(RunState::Created),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        })
    }
}

impl Watcher {
    /// Validate `config` and load existing history from its destination
    pub fn new(config: WatcherConfig) -> Result<Self, WatcherError> {
        Self::builder(config).build()
    }

    pub fn builder(config: WatcherConfig) -> WatcherBuilder {
        WatcherBuilder {
            config,
            source: Arc::new(NotifySource::new()),
            copier: Arc::new(FsCopier::new()),
            retry: RetryPolicy::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.config.name()
    }

    /// The validated configuration
    pub fn config(&self) -> &ValidatedConfig {
        &self.inner.config
    }

    /// Copy of the snapshot history, oldest first
    pub fn history(&self) -> Vec<Backup> {
        self.inner.history.read().clone()
    }

    pub fn latest_backup(&self) -> Option<Backup> {
        self.inner.history.read().last().cloned()
    }

    pub fn backup_count(&self) -> usize {
        self.inner.history.read().len()
    }

    /// Absolute folder of a recorded backup
    pub fn backup_dir(&self, backup: &Backup) -> PathBuf {
        self.inner.config.destination().join(&backup.path)
    }

    pub fn state(&self) -> WatcherState {
        match *self.inner.run.lock() {
            RunState::Created => WatcherState::Created,
            RunState::Running(_) => WatcherState::Running,
            RunState::Stopped => WatcherState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == WatcherState::Running
    }

    /// Register an observer; adding the same observer twice has no effect
    pub fn add_observer(&self, observer: Arc<dyn BackupObserver>) -> bool {
        self.inner.observers.add(observer)
    }

    /// Unregister an observer; removing an absent observer has no effect
    pub fn remove_observer(&self, observer: &Arc<dyn BackupObserver>) -> bool {
        self.inner.observers.remove(observer)
    }

    /// Start watching
    ///
    /// With an empty history, or when the latest backup no longer matches the
    /// source (or cannot be compared), a first snapshot is scheduled through
    /// the normal debounce path. While a `stop` is still draining, this waits
    /// for it to finish first.
    pub async fn start(&self) -> Result<(), WatcherError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let mailbox = {
            let mut run = self.inner.run.lock();
            if !self.inner.config.enabled() {
                return Err(WatcherError::Disabled(self.name().to_string()));
            }
            if matches!(*run, RunState::Running(_)) {
                return Err(WatcherError::AlreadyRunning(self.name().to_string()));
            }

            let subscription = self
                .inner
                .source
                .subscribe(self.inner.config.source())
                .map_err(WatcherError::Subscribe)?;

            let (mailbox_tx, mailbox_rx) = mpsc::channel(1);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);

            let forwarder = tokio::spawn(forward_changes(
                self.name().to_string(),
                subscription,
                mailbox_tx.clone(),
                shutdown_rx.clone(),
            ));
            let debouncer = tokio::spawn(
                DebounceLoop::new(
                    self.downgrade(),
                    &self.inner.config,
                    Arc::clone(&self.inner.engine),
                    mailbox_rx,
                    shutdown_rx,
                )
                .run(),
            );

            *run = RunState::Running(Running {
                shutdown: shutdown_tx,
                mailbox: mailbox_tx.clone(),
                tasks: vec![forwarder, debouncer],
            });
            mailbox_tx
        };

        info!(
            "{}: Watching {} -> {}",
            self.name(),
            self.inner.config.source().display(),
            self.inner.config.destination().display()
        );

        if self.needs_initial_snapshot().await {
            let _ = mailbox.try_send(());
        }
        Ok(())
    }

    /// Stop watching; stopping a watcher that is not running does nothing
    ///
    /// A snapshot already in progress finishes before this returns. A pending
    /// debounce timer is discarded.
    pub async fn stop(&self) -> Result<(), WatcherError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let running = {
            let mut run = self.inner.run.lock();
            match std::mem::replace(&mut *run, RunState::Stopped) {
                RunState::Running(running) => running,
                other => {
                    *run = other;
                    return Ok(());
                }
            }
        };

        info!("{}: Stopping watcher", self.name());
        let _ = running.shutdown.send(true);
        drop(running.mailbox);

        let mut result = Ok(());
        for task in running.tasks {
            if let Err(e) = task.await {
                warn!("{}: Watcher task ended abnormally: {}", self.name(), e);
                result = Err(WatcherError::Task(e));
            }
        }
        result
    }

    /// Request a snapshot as if a change had been observed
    pub fn request_snapshot(&self) -> Result<(), WatcherError> {
        match &*self.inner.run.lock() {
            RunState::Running(running) => {
                let _ = running.mailbox.try_send(());
                Ok(())
            }
            _ => Err(WatcherError::NotRunning(self.name().to_string())),
        }
    }

    async fn needs_initial_snapshot(&self) -> bool {
        let Some(latest) = self.latest_backup() else {
            info!("{}: No backups yet, scheduling initial backup", self.name());
            return true;
        };

        let source = self.inner.config.source().to_path_buf();
        let backup_dir = self.backup_dir(&latest);
        let compared = {
            let backup_dir = backup_dir.clone();
            tokio::task::spawn_blocking(move || compare_trees(&source, &backup_dir)).await
        };

        match compared {
            Ok(Ok(TreeComparison::Match)) => {
                info!(
                    "{}: Latest backup {} matches source, no initial backup needed",
                    self.name(),
                    backup_dir.display()
                );
                false
            }
            Ok(Ok(TreeComparison::Mismatch { path, reason })) => {
                info!(
                    "{}: Source differs from latest backup at {:?} ({}), scheduling backup",
                    self.name(),
                    path,
                    reason
                );
                true
            }
            Ok(Err(e)) => {
                warn!("{}: Cannot compare with latest backup: {}", self.name(), e);
                true
            }
            Err(e) => {
                warn!("{}: Comparison task failed: {}", self.name(), e);
                true
            }
        }
    }

    pub(crate) fn downgrade(&self) -> WeakWatcher {
        WeakWatcher {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn history_sink(&self) -> WatcherHistory<'_> {
        WatcherHistory { inner: &self.inner }
    }

    pub(crate) fn notify_observers(&self) {
        self.inner.observers.notify_all(self);
    }
}

/// Handle that does not keep a watcher alive
#[derive(Clone)]
pub(crate) struct WeakWatcher {
    inner: Weak<Inner>,
}

impl WeakWatcher {
    pub(crate) fn upgrade(&self) -> Option<Watcher> {
        self.inner.upgrade().map(|inner| Watcher { inner })
    }
}

/// Appends to a watcher's in-memory history and persists the whole list
pub(crate) struct WatcherHistory<'a> {
    inner: &'a Inner,
}

impl HistorySink for WatcherHistory<'_> {
    fn record(&self, backup: Backup) -> Result<(), StoreError> {
        let snapshot = {
            let mut history = self.inner.history.write();
            history.push(backup);
            history.clone()
        };
        self.inner
            .store
            .save(self.inner.config.destination(), &snapshot)
    }
}
