//! User settings file (`config.toml`)
//!
//! ```toml
//! [defaults]
//! wait_time = 1.0
//! folder_format = "%Y-%m-%d_%H-%M-%S%.6f"
//!
//! [log]
//! level = "info"
//! file = "/var/log/isawthat.log"
//! ```
//!
//! Command-line flags win over these values, which win over built-in defaults.

use anyhow::{Context, Result};
use isawthat_core::{DEFAULT_FOLDER_FORMAT, DEFAULT_WAIT_TIME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Example settings file printed by `isawthat config --example`
pub const EXAMPLE: &str = r#"# I Saw That settings

[defaults]
# Seconds of quiet before a snapshot is taken
wait_time = 1.0
# strftime pattern naming each snapshot folder
folder_format = "%Y-%m-%d_%H-%M-%S%.6f"

[log]
# error, warn, info, debug or trace (RUST_LOG takes precedence)
level = "info"
# Also write logs to this file
# file = "/tmp/isawthat.log"
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub defaults: Defaults,
    pub log: LogSettings,
}

/// Defaults for watcher options not given on the command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
    pub wait_time: f64,
    pub folder_format: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            wait_time: DEFAULT_WAIT_TIME,
            folder_format: DEFAULT_FOLDER_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Default settings location: `<config dir>/isawthat/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("isawthat").join("config.toml"))
}

/// Load settings
///
/// An explicit path must exist. The default path is optional; without it the
/// built-in defaults apply.
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    match explicit {
        Some(path) => read(path),
        None => match default_path() {
            Some(path) if path.is_file() => read(&path),
            _ => Ok(Settings::default()),
        },
    }
}

pub fn parse(text: &str) -> Result<Settings> {
    toml::from_str(text).context("Invalid settings")
}

fn read(path: &Path) -> Result<Settings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    parse(&text).with_context(|| format!("Failed to load settings from {}", path.display()))
}
