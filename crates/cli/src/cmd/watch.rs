//! Run one watcher in the foreground until Ctrl-C

use super::WatcherArgs;
use crate::settings::Settings;
use crate::util;
use anyhow::{Context, Result};
use isawthat_watcher::{BackupObserver, Watcher};
use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub async fn run(args: &WatcherArgs, settings: &Settings) -> Result<()> {
    let watcher = Watcher::new(args.to_config(settings)).context("Failed to create watcher")?;
    let config = watcher.config();

    println!("{}", format!("Watching {}", config.name()).bold());
    println!("  Source:      {}", config.source().display().to_string().cyan());
    println!("  Destination: {}", config.destination().display().to_string().cyan());
    println!("  Wait time:   {:.3}s", config.wait().as_secs_f64());
    println!("  Backups:     {}", watcher.backup_count());
    println!("  {}", "Press Ctrl-C to stop".dimmed());
    println!();

    watcher.add_observer(Arc::new(PrintObserver::new(watcher.backup_count())));
    watcher.start().await.context("Failed to start watcher")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    println!();
    println!("Stopping...");
    watcher.stop().await.context("Failed to stop watcher")?;
    println!("{} backups recorded", watcher.backup_count());

    Ok(())
}

/// Prints a line for every snapshot attempt
struct PrintObserver {
    seen: AtomicUsize,
}

impl PrintObserver {
    fn new(existing: usize) -> Self {
        Self {
            seen: AtomicUsize::new(existing),
        }
    }
}

impl BackupObserver for PrintObserver {
    fn on_backup_completion(&self, watcher: &Watcher) {
        let count = watcher.backup_count();
        let previous = self.seen.swap(count, Ordering::SeqCst);

        match watcher.latest_backup() {
            Some(backup) if count > previous => println!(
                "{} {}  {}",
                "✓".green(),
                backup.path.yellow(),
                util::format_absolute_time(backup.timestamp).dimmed()
            ),
            _ => println!(
                "{} {}",
                "✗".red(),
                "Backup attempt failed, see log for details".red()
            ),
        }
    }
}
