//! Backup record: one entry of a watcher's snapshot history

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A completed snapshot of the source tree
///
/// Records are immutable once appended and are kept in creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    /// Display name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Creation time, seconds since the Unix epoch with fractional part
    pub timestamp: f64,
    /// Folder of this snapshot, relative to the destination directory
    pub path: String,
    /// Reserved; snapshots are always stored uncompressed
    #[serde(default, skip_serializing_if = "is_false")]
    pub compressed: bool,
}

impl Backup {
    /// Create a record for a snapshot taken at `at` into folder `path`
    pub fn at(at: SystemTime, path: impl Into<String>) -> Self {
        Self {
            name: None,
            timestamp: unix_seconds(at),
            path: path.into(),
            compressed: false,
        }
    }

    /// Attach a display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Seconds since the epoch as a float; instants before the epoch are negative
pub fn unix_seconds(at: SystemTime) -> f64 {
    match at.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamp_keeps_fraction() {
        let at = UNIX_EPOCH + Duration::from_millis(1_500);
        let backup = Backup::at(at, "folder");
        assert!((backup.timestamp - 1.5).abs() < 1e-9);
        assert_eq!(backup.path, "folder");
        assert!(backup.name.is_none());
        assert!(!backup.compressed);
    }

    #[test]
    fn test_optional_fields_omitted_from_json() {
        let backup = Backup::at(UNIX_EPOCH + Duration::from_secs(2), "a");
        let json = serde_json::to_string(&backup).unwrap();
        assert_eq!(json, r#"{"timestamp":2.0,"path":"a"}"#);

        let named = backup.with_name("nightly");
        let json = serde_json::to_string(&named).unwrap();
        assert!(json.contains(r#""name":"nightly""#));
        assert!(!json.contains("compressed"));
    }

    #[test]
    fn test_reads_records_with_all_fields() {
        let json = r#"{"name":"x","timestamp":10.25,"path":"p","compressed":true}"#;
        let backup: Backup = serde_json::from_str(json).unwrap();
        assert_eq!(backup.name.as_deref(), Some("x"));
        assert!(backup.compressed);
        assert!((backup.timestamp - 10.25).abs() < 1e-9);
    }
}
