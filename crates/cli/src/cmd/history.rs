//! List the backups recorded in a destination

use crate::util;
use anyhow::{Context, Result};
use isawthat_core::MetadataStore;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(destination: &Path, limit: Option<usize>) -> Result<()> {
    let backups = MetadataStore::global()
        .load(destination)
        .context("Failed to read backup history")?;

    if backups.is_empty() {
        println!("No backups recorded in {}", destination.display());
        return Ok(());
    }

    println!("{}", format!("Backups in {}", destination.display()).bold());
    println!();

    let shown = limit.unwrap_or(backups.len()).min(backups.len());
    for backup in backups.iter().rev().take(shown) {
        let missing = if destination.join(&backup.path).is_dir() {
            String::new()
        } else {
            format!("  {}", "(folder missing)".red())
        };

        println!(
            "  {}  {} ({}){}",
            backup.path.yellow(),
            util::format_relative_time(backup.timestamp),
            util::format_absolute_time(backup.timestamp).dimmed(),
            missing
        );
    }

    if shown < backups.len() {
        println!();
        println!(
            "  {}",
            format!("... {} older backups not shown", backups.len() - shown).dimmed()
        );
    }

    Ok(())
}
