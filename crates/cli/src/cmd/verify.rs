//! Compare a source tree with its latest backup

use anyhow::{Context, Result};
use isawthat_core::{compare_trees, MetadataStore, TreeComparison};
use owo_colors::OwoColorize;
use std::path::Path;

/// Returns whether the latest backup matches the source
pub async fn run(source: &Path, destination: &Path) -> Result<bool> {
    let backups = MetadataStore::global()
        .load(destination)
        .context("Failed to read backup history")?;

    let Some(latest) = backups.last() else {
        println!("{} No backups recorded in {}", "✗".red(), destination.display());
        return Ok(false);
    };

    let backup_dir = destination.join(&latest.path);
    let comparison = {
        let source = source.to_path_buf();
        let backup_dir = backup_dir.clone();
        tokio::task::spawn_blocking(move || compare_trees(&source, &backup_dir))
            .await
            .context("Comparison task failed")?
            .context("Failed to compare trees")?
    };

    match comparison {
        TreeComparison::Match => {
            println!(
                "{} {} matches latest backup {}",
                "✓".green(),
                source.display(),
                latest.path.yellow()
            );
            Ok(true)
        }
        TreeComparison::Mismatch { path, reason } => {
            println!(
                "{} {} differs from latest backup {}",
                "✗".red(),
                source.display(),
                latest.path.yellow()
            );
            let shown = if path.as_os_str().is_empty() {
                ".".to_string()
            } else {
                path.display().to_string()
            };
            println!("  First difference at {}: {}", shown.cyan(), reason);
            Ok(false)
        }
    }
}
