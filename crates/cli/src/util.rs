//! Shared utilities for CLI commands

use chrono::{DateTime, Local};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Format a Unix timestamp (seconds) as relative time ("2 hours ago")
pub fn format_relative_time(timestamp: f64) -> String {
    let Ok(offset) = Duration::try_from_secs_f64(timestamp) else {
        return "at an unknown time".to_string();
    };
    let datetime = UNIX_EPOCH + offset;

    if let Ok(elapsed) = SystemTime::now().duration_since(datetime) {
        let seconds = elapsed.as_secs();

        if seconds < 60 {
            format!("{} seconds ago", seconds)
        } else if seconds < 3600 {
            format!("{} minutes ago", seconds / 60)
        } else if seconds < 86400 {
            format!("{} hours ago", seconds / 3600)
        } else if seconds < 604800 {
            format!("{} days ago", seconds / 86400)
        } else {
            format!("{} weeks ago", seconds / 604800)
        }
    } else {
        "in the future".to_string()
    }
}

/// Format a Unix timestamp (seconds) as local time ("2024-01-03 14:30:00")
pub fn format_absolute_time(timestamp: f64) -> String {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;

    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "invalid time".to_string())
}

/// Default watcher name for a source directory: its final path component
pub fn default_name(source: &std::path::Path) -> String {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "default".to_string())
}
