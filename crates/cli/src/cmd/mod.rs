//! CLI command implementations

pub mod check;
pub mod config;
pub mod history;
pub mod verify;
pub mod watch;

use crate::settings::Settings;
use crate::util;
use clap::Args;
use isawthat_core::WatcherConfig;
use std::path::PathBuf;

/// Options describing one watcher
#[derive(Args, Debug, Clone)]
pub struct WatcherArgs {
    /// Directory to watch
    pub source: PathBuf,

    /// Directory receiving snapshot folders
    pub destination: PathBuf,

    /// Watcher name shown in logs (default: source directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Seconds of quiet before a snapshot is taken
    #[arg(short, long)]
    pub wait_time: Option<f64>,

    /// strftime pattern naming each snapshot folder
    #[arg(short, long)]
    pub folder_format: Option<String>,
}

impl WatcherArgs {
    /// Merge flags over settings defaults
    pub fn to_config(&self, settings: &Settings) -> WatcherConfig {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| util::default_name(&self.source));

        WatcherConfig::new(name, &self.source, &self.destination)
            .with_wait_time(self.wait_time.unwrap_or(settings.defaults.wait_time))
            .with_folder_format(
                self.folder_format
                    .clone()
                    .unwrap_or_else(|| settings.defaults.folder_format.clone()),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> WatcherArgs {
        WatcherArgs {
            source: PathBuf::from("/data/notes"),
            destination: PathBuf::from("/backups/notes"),
            name: None,
            wait_time: None,
            folder_format: None,
        }
    }

    #[test]
    fn test_settings_fill_missing_flags() {
        let mut settings = Settings::default();
        settings.defaults.wait_time = 3.0;
        settings.defaults.folder_format = "%Y%m%d-%H%M%S".into();

        let config = args().to_config(&settings);

        assert_eq!(config.name, "notes");
        assert_eq!(config.wait_time, 3.0);
        assert_eq!(config.folder_format, "%Y%m%d-%H%M%S");
        assert!(config.enabled);
    }

    #[test]
    fn test_flags_win_over_settings() {
        let mut settings = Settings::default();
        settings.defaults.wait_time = 3.0;
        let mut args = args();
        args.name = Some("docs".into());
        args.wait_time = Some(0.5);

        let config = args.to_config(&settings);

        assert_eq!(config.name, "docs");
        assert_eq!(config.wait_time, 0.5);
    }
}
