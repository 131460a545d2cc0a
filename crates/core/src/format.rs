//! Folder-name templates for snapshot directories
//!
//! Snapshot folders are named by applying a strftime-style pattern to the
//! wall-clock time of the snapshot, e.g. `%Y-%m-%d_%H-%M-%S%.6f`.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::{self, Write};
use std::time::Duration;
use thiserror::Error;

/// Default pattern: one folder per microsecond
pub const DEFAULT_FOLDER_FORMAT: &str = "%Y-%m-%d_%H-%M-%S%.6f";

/// Errors produced while parsing or rendering a folder format
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The pattern contains a specifier chrono does not understand
    #[error("invalid format specifier in {pattern:?}")]
    InvalidPattern { pattern: String },

    /// The pattern parsed but could not be rendered for this instant
    #[error("format {pattern:?} cannot be rendered")]
    Unrenderable { pattern: String },

    /// The rendered name cannot be used as a single directory name
    #[error("rendered name {rendered:?} is not a valid directory name: {reason}")]
    IllegalName { rendered: String, reason: &'static str },

    /// The instant is outside the representable range
    #[error("timestamp {secs}s is out of range")]
    OutOfRange { secs: i64 },
}

/// A parsed folder-name template
#[derive(Clone, PartialEq, Eq)]
pub struct FolderFormat {
    pattern: String,
}

impl FolderFormat {
    /// Parse a strftime pattern, rejecting unknown specifiers
    pub fn parse(pattern: &str) -> Result<Self, FormatError> {
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(FormatError::InvalidPattern {
                pattern: pattern.to_string(),
            });
        }

        Ok(Self {
            pattern: pattern.to_string(),
        })
    }

    /// The raw pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Render the pattern for an instant in any time zone
    ///
    /// Uses `write!` rather than `to_string()` so an unsupported item surfaces
    /// as an error instead of a panic.
    pub fn render<Tz>(&self, instant: &DateTime<Tz>) -> Result<String, FormatError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let mut out = String::new();
        write!(out, "{}", instant.format_with_items(StrftimeItems::new(&self.pattern)))
            .map_err(|_| FormatError::Unrenderable {
                pattern: self.pattern.clone(),
            })?;
        Ok(out)
    }

    /// Render the pattern for a Unix instant, in local time
    pub fn render_unix(&self, secs: i64, nanos: u32) -> Result<String, FormatError> {
        let utc = DateTime::<Utc>::from_timestamp(secs, nanos)
            .ok_or(FormatError::OutOfRange { secs })?;
        self.render(&utc.with_timezone(&Local))
    }

    /// Render the pattern for the current local time
    pub fn render_now(&self) -> Result<String, FormatError> {
        self.render(&Local::now())
    }

    /// Render at the epoch and check the result is a legal directory name
    pub fn check_directory_name(&self) -> Result<(), FormatError> {
        let rendered = self.render_unix(0, 0)?;
        check_dir_name(&rendered).map_err(|reason| FormatError::IllegalName {
            rendered: rendered.clone(),
            reason,
        })
    }

    /// Whether two instants `interval` apart render to different names
    ///
    /// The reference instants are the epoch and the epoch plus `interval`.
    pub fn distinguishes(&self, interval: Duration) -> Result<bool, FormatError> {
        let secs = i64::try_from(interval.as_secs()).map_err(|_| FormatError::OutOfRange {
            secs: i64::MAX,
        })?;
        let first = self.render_unix(0, 0)?;
        let second = self.render_unix(secs, interval.subsec_nanos())?;
        Ok(first != second)
    }
}

impl Default for FolderFormat {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_FOLDER_FORMAT.to_string(),
        }
    }
}

impl fmt::Debug for FolderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FolderFormat({:?})", self.pattern)
    }
}

impl fmt::Display for FolderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Check that `name` can be used as one path component
fn check_dir_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    if name == "." || name == ".." {
        return Err("name refers to a relative directory");
    }
    if name.contains('/') || name.contains('\\') {
        return Err("name contains a path separator");
    }
    if name.contains('\0') {
        return Err("name contains a NUL byte");
    }

    if cfg!(windows) {
        if name.chars().any(|c| matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*') || c.is_control()) {
            return Err("name contains a character reserved on Windows");
        }
        if name.ends_with('.') || name.ends_with(' ') {
            return Err("name ends with a dot or space");
        }
    }

    Ok(())
}
