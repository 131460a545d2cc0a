//! Shared fixtures for watcher integration tests

#![allow(dead_code)]

use isawthat_core::WatcherConfig;
use isawthat_watcher::{
    BackupObserver, ChangeEvent, ChangeSource, EventKind, FsCopier, RetryPolicy, SourceError,
    Subscription, TreeCopier, Watcher,
};
use parking_lot::Mutex;
use rand::RngCore;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Source and destination directories inside one temp dir
pub struct Fixture {
    _temp_dir: TempDir,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl Fixture {
    /// Source pre-populated with a few nested files
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let source = temp_dir.path().join("watched");
        let destination = temp_dir.path().join("backups");
        fs::create_dir_all(source.join("docs/drafts")).unwrap();

        write_file(&source, "readme.txt", b"hello");
        write_file(&source, "docs/plan.md", b"# plan");
        write_random_file(&source, "docs/drafts/blob.bin", 32 * 1024);

        Self {
            _temp_dir: temp_dir,
            source,
            destination,
        }
    }

    pub fn config(&self, wait_time: f64) -> WatcherConfig {
        WatcherConfig::new("test", &self.source, &self.destination).with_wait_time(wait_time)
    }
}

pub fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn write_random_file(root: &Path, rel: &str, size: usize) {
    let mut data = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut data);
    write_file(root, rel, &data);
}

/// Change source driven by the test instead of the file system
#[derive(Default)]
pub struct ManualSource {
    senders: Mutex<Vec<mpsc::UnboundedSender<ChangeEvent>>>,
    subscriptions: AtomicUsize,
}

impl ManualSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver one event to every live subscription; returns how many got it
    pub fn emit(&self) -> usize {
        let event = ChangeEvent::new(EventKind::Modify, vec![PathBuf::from("changed.txt")]);
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
        senders.len()
    }

    /// Total number of subscribe calls so far
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl ChangeSource for ManualSource {
    fn subscribe(&self, _root: &Path) -> Result<Subscription, SourceError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel::<SourceError>();
        self.senders.lock().push(event_tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        // The error sender lives as long as the subscription
        Ok(Subscription::new(event_rx, error_rx, error_tx))
    }
}

/// Copier that sleeps before copying, to keep a snapshot in flight
pub struct SlowCopier {
    delay: Duration,
}

impl SlowCopier {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay })
    }
}

impl TreeCopier for SlowCopier {
    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::thread::sleep(self.delay);
        FsCopier::new().copy_tree(from, to)
    }
}

/// Slow copier recording the highest number of copies running at once
#[derive(Default)]
pub struct OverlapCopier {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl OverlapCopier {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl TreeCopier for OverlapCopier {
    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let result = FsCopier::new().copy_tree(from, to);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Copier that always fails after creating a partial target
pub struct FailingCopier;

impl TreeCopier for FailingCopier {
    fn copy_tree(&self, _from: &Path, to: &Path) -> io::Result<()> {
        fs::create_dir_all(to)?;
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked file"))
    }
}

/// Observer counting completion callbacks
#[derive(Default)]
pub struct CountingObserver {
    count: AtomicUsize,
}

impl CountingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Poll until at least `expected` callbacks were seen
    pub async fn wait_for(&self, expected: usize, timeout: Duration) -> bool {
        let started = Instant::now();
        while started.elapsed() < timeout {
            if self.count() >= expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.count() >= expected
    }
}

impl BackupObserver for CountingObserver {
    fn on_backup_completion(&self, _watcher: &Watcher) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        delay: Duration::from_millis(10),
    }
}

/// Watcher driven by a manual source, with a counting observer attached
pub fn manual_watcher(
    config: WatcherConfig,
    copier: Arc<dyn TreeCopier>,
) -> (Watcher, Arc<ManualSource>, Arc<CountingObserver>) {
    let source = ManualSource::new();
    let watcher = Watcher::builder(config)
        .change_source(source.clone())
        .copier(copier)
        .retry_policy(quick_retry())
        .build()
        .expect("build watcher");
    let observer = CountingObserver::new();
    watcher.add_observer(observer.clone());
    (watcher, source, observer)
}

pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
