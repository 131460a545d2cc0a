//! Debounce loop: coalesce bursts of change notifications into one snapshot
//!
//! Two tasks cooperate per running watcher:
//! - The forwarder drains the change subscription and posts a signal into a
//!   single-slot mailbox. A full mailbox already represents the change, so
//!   extra signals are dropped without losing anything.
//! - The loop owns the timer. Each signal re-arms it `wait` from now; when it
//!   fires, one snapshot runs to completion before the mailbox is read again,
//!   so at most one snapshot per watcher is ever in flight.
//!
//! The loop holds the watcher weakly. Dropping the last handle drops the
//! shutdown sender, which ends both tasks.

use crate::engine::{SnapshotEngine, SnapshotSettings};
use crate::source::Subscription;
use crate::{Watcher, WeakWatcher};
use isawthat_core::ValidatedConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, trace, warn};

/// Forward change notifications into the mailbox until shutdown
pub(crate) async fn forward_changes(
    name: String,
    mut subscription: Subscription,
    mailbox: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            next = subscription.next() => match next {
                Some(Ok(event)) => {
                    debug!("{}: File event detected: {:?} {:?}", name, event.kind, event.paths);
                    match mailbox.try_send(()) {
                        Ok(()) | Err(TrySendError::Full(())) => {}
                        Err(TrySendError::Closed(())) => break,
                    }
                }
                Some(Err(e)) => warn!("{}: Error watching files: {}", name, e),
                None => {
                    debug!("{}: Change stream ended", name);
                    break;
                }
            },
        }
    }

    subscription.close();
    trace!("{}: Forwarder stopped", name);
}

/// Timer-owning half of a running watcher
pub(crate) struct DebounceLoop {
    name: String,
    watcher: WeakWatcher,
    engine: Arc<SnapshotEngine>,
    settings: SnapshotSettings,
    wait: Duration,
    mailbox: mpsc::Receiver<()>,
    shutdown: watch::Receiver<bool>,
}

impl DebounceLoop {
    pub(crate) fn new(
        watcher: WeakWatcher,
        config: &ValidatedConfig,
        engine: Arc<SnapshotEngine>,
        mailbox: mpsc::Receiver<()>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name: config.name().to_string(),
            watcher,
            settings: SnapshotSettings::from_config(config),
            wait: config.wait(),
            engine,
            mailbox,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut deadline: Option<Instant> = None;
        let mut mailbox_open = true;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => break,

                signal = self.mailbox.recv(), if mailbox_open => match signal {
                    Some(()) => {
                        deadline = Some(Instant::now() + self.wait);
                        trace!("{}: Debounce timer reset", self.name);
                    }
                    None => mailbox_open = false,
                },

                _ = expired(deadline), if deadline.is_some() => {
                    deadline = None;
                    let Some(watcher) = self.watcher.upgrade() else {
                        break;
                    };
                    take_snapshot(Arc::clone(&self.engine), self.settings.clone(), watcher).await;
                }
            }
        }

        // A pending timer is simply discarded
        trace!("{}: Debounce loop stopped", self.name);
    }
}

/// Run one snapshot on the blocking pool and notify observers afterwards
async fn take_snapshot(engine: Arc<SnapshotEngine>, settings: SnapshotSettings, watcher: Watcher) {
    let name = watcher.name().to_string();

    let result = tokio::task::spawn_blocking(move || {
        let outcome = engine.run(&settings, &watcher.history_sink());
        if outcome.attempted() {
            watcher.notify_observers();
        }
        outcome
    })
    .await;

    match result {
        Ok(outcome) => debug!("{}: Snapshot finished: {:?}", name, outcome),
        Err(e) => error!("{}: Snapshot task failed: {}", name, e),
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
