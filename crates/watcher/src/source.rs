//! Change-notification sources
//!
//! A source delivers one event for every create/modify/delete/rename anywhere
//! below a watched root, plus a separate stream of errors. Dropping (or
//! closing) the subscription unsubscribes.

use notify::{EventKind as NotifyKind, RecursiveMode, Watcher as _};
use std::any::Any;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from a change-notification source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to watch {}: {source}", path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("change notification backend error: {0}")]
    Backend(#[from] notify::Error),

    #[error("{0}")]
    Other(String),
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File created
    Create,
    /// File modified
    Modify,
    /// File deleted
    Delete,
    /// File renamed
    Rename,
    /// Anything else the backend reports
    Other,
}

/// File system event
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Type of change, for logging only
    pub kind: EventKind,
    /// Paths that changed
    pub paths: Vec<PathBuf>,
}

impl ChangeEvent {
    pub fn new(kind: EventKind, paths: Vec<PathBuf>) -> Self {
        Self { kind, paths }
    }
}

/// An active subscription to a change source
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    errors: mpsc::UnboundedReceiver<SourceError>,
    errors_open: bool,
    _guard: Box<dyn Any + Send>,
}

impl Subscription {
    /// Assemble a subscription; `guard` is dropped on unsubscribe
    pub fn new(
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        errors: mpsc::UnboundedReceiver<SourceError>,
        guard: impl Any + Send,
    ) -> Self {
        Self {
            events,
            errors,
            errors_open: true,
            _guard: Box::new(guard),
        }
    }

    /// Next event or error; `None` once the event stream has ended
    pub async fn next(&mut self) -> Option<Result<ChangeEvent, SourceError>> {
        loop {
            tokio::select! {
                event = self.events.recv() => return event.map(Ok),
                error = self.errors.recv(), if self.errors_open => match error {
                    Some(error) => return Some(Err(error)),
                    None => self.errors_open = false,
                },
            }
        }
    }

    /// Unsubscribe
    pub fn close(self) {}
}

/// Something that can watch a directory tree recursively
pub trait ChangeSource: Send + Sync {
    fn subscribe(&self, root: &Path) -> Result<Subscription, SourceError>;
}

/// Change source backed by the platform's native notifier
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySource;

impl NotifySource {
    pub fn new() -> Self {
        Self
    }
}

impl ChangeSource for NotifySource {
    fn subscribe(&self, root: &Path) -> Result<Subscription, SourceError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    // Reads (including our own copies) must not look like changes
                    if matches!(event.kind, NotifyKind::Access(_)) {
                        return;
                    }
                    let _ = event_tx.send(ChangeEvent::from(event));
                }
                Err(e) => {
                    let _ = error_tx.send(SourceError::Backend(e));
                }
            }
        })
        .map_err(|source| SourceError::Subscribe {
            path: root.to_path_buf(),
            source,
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| SourceError::Subscribe {
                path: root.to_path_buf(),
                source,
            })?;

        Ok(Subscription::new(event_rx, error_rx, watcher))
    }
}

impl From<notify::Event> for ChangeEvent {
    fn from(event: notify::Event) -> Self {
        use notify::event::ModifyKind;

        let kind = match event.kind {
            NotifyKind::Create(_) => EventKind::Create,
            NotifyKind::Modify(ModifyKind::Name(_)) => EventKind::Rename,
            NotifyKind::Modify(_) => EventKind::Modify,
            NotifyKind::Remove(_) => EventKind::Delete,
            _ => EventKind::Other,
        };

        Self {
            kind,
            paths: event.paths,
        }
    }
}
