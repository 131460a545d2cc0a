//! Validate a watcher configuration and report every problem at once

use super::WatcherArgs;
use crate::settings::Settings;
use anyhow::Result;
use owo_colors::OwoColorize;

/// Returns whether the configuration is valid
pub fn run(args: &WatcherArgs, settings: &Settings) -> Result<bool> {
    let config = args.to_config(settings);

    match config.validate() {
        Ok(validated) => {
            println!("{} {}", "✓".green(), "Configuration is valid".bold());
            println!("  Name:        {}", validated.name());
            println!("  Source:      {}", validated.source().display());
            println!("  Destination: {}", validated.destination().display());
            println!("  Wait time:   {:.3}s", validated.wait().as_secs_f64());
            if let Ok(example) = validated.folder_format().render_now() {
                println!("  Next folder: {}", example.yellow());
            }
            Ok(true)
        }
        Err(errors) => {
            let noun = if errors.len() == 1 { "problem" } else { "problems" };
            println!(
                "{} {}",
                "✗".red(),
                format!("{} configuration {}", errors.len(), noun).bold()
            );
            for error in &errors {
                println!("  {} {}: {}", "-".red(), error.field().to_string().cyan(), error);
            }
            Ok(false)
        }
    }
}
