//! Settings file inspection
//!
//! Shows where settings are read from, the effective values, or an example file.

use crate::settings::{self, Settings};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

pub fn run(settings: &Settings, explicit: Option<&Path>, path: bool, example: bool) -> Result<()> {
    if example {
        print!("{}", settings::EXAMPLE);
        return Ok(());
    }

    let location = location(explicit).context("Could not determine config directory")?;
    if path {
        println!("{}", location.display());
        return Ok(());
    }

    println!("{}", "Settings".bold());
    let status = if location.is_file() { "" } else { " (not found, using defaults)" };
    println!(
        "{}: {}{}\n",
        "Location".dimmed(),
        location.display().dimmed(),
        status.dimmed()
    );

    println!("{}", "[defaults]".yellow());
    println!(
        "  {} = {} {}",
        "wait_time".cyan(),
        settings.defaults.wait_time,
        "(seconds)".dimmed()
    );
    println!("  {} = {:?}", "folder_format".cyan(), settings.defaults.folder_format);

    println!("\n{}", "[log]".yellow());
    println!("  {} = {:?}", "level".cyan(), settings.log.level);
    match &settings.log.file {
        Some(file) => println!("  {} = {:?}", "file".cyan(), file.display().to_string()),
        None => println!("  {} = {}", "file".cyan(), "(stderr only)".dimmed()),
    }

    Ok(())
}

fn location(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(settings::default_path)
}
