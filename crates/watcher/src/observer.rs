//! Backup-completion observers

use crate::Watcher;
use parking_lot::Mutex;
use std::sync::Arc;

/// Notified after every snapshot attempt that got past the collision check
///
/// Callbacks run synchronously on the snapshot thread, so a slow observer
/// delays the next snapshot.
pub trait BackupObserver: Send + Sync {
    fn on_backup_completion(&self, watcher: &Watcher);
}

impl<F> BackupObserver for F
where
    F: Fn(&Watcher) + Send + Sync,
{
    fn on_backup_completion(&self, watcher: &Watcher) {
        self(watcher)
    }
}

/// Set of observers, compared by identity
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<Arc<dyn BackupObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer; returns false if that same observer is already present
    pub fn add(&self, observer: Arc<dyn BackupObserver>) -> bool {
        let mut observers = self.observers.lock();
        if observers.iter().any(|o| same_observer(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Remove an observer; returns false if it was not present
    pub fn remove(&self, observer: &Arc<dyn BackupObserver>) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| !same_observer(o, observer));
        observers.len() != before
    }

    /// Call every observer registered at the moment of the call
    ///
    /// The lock is released before any callback runs, so observers may add or
    /// remove observers from inside the callback.
    pub fn notify_all(&self, watcher: &Watcher) {
        let snapshot: Vec<_> = self.observers.lock().clone();
        for observer in snapshot {
            observer.on_backup_completion(watcher);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }
}

fn same_observer(a: &Arc<dyn BackupObserver>, b: &Arc<dyn BackupObserver>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
