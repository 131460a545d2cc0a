//! Watcher configuration and its validation
//!
//! Validation never stops at the first problem: every independent check runs
//! and all failures are returned together, so a caller can show them at once.
//!
//! Validating a configuration has one side effect: missing source and
//! destination directories are created.

use crate::format::{FolderFormat, FormatError, DEFAULT_FOLDER_FORMAT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default debounce window in seconds
pub const DEFAULT_WAIT_TIME: f64 = 1.0;

/// Configuration of one watcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Identifier shown in logs
    pub name: String,
    /// Directory tree being watched
    pub source: PathBuf,
    /// Directory receiving snapshot folders and `metadata.json`
    pub destination: PathBuf,
    /// Disabled watchers refuse to start
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Debounce window in seconds (fractional)
    #[serde(default = "default_wait_time")]
    pub wait_time: f64,
    /// strftime pattern naming each snapshot folder
    #[serde(default = "default_folder_format")]
    pub folder_format: String,
}

impl WatcherConfig {
    /// Create an enabled config with the default wait time and folder format
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            destination: destination.into(),
            enabled: default_enabled(),
            wait_time: default_wait_time(),
            folder_format: default_folder_format(),
        }
    }

    pub fn with_wait_time(mut self, seconds: f64) -> Self {
        self.wait_time = seconds;
        self
    }

    pub fn with_folder_format(mut self, format: impl Into<String>) -> Self {
        self.folder_format = format.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Run every check and collect all failures
    pub fn validate(&self) -> Result<ValidatedConfig, ValidationErrors> {
        let mut errors = Vec::new();

        if self.name.is_empty() {
            errors.push(ConfigError::EmptyName);
        }

        let wait = wait_duration(self.wait_time);
        if wait.is_none() {
            errors.push(ConfigError::InvalidWaitTime(self.wait_time));
        }

        let format = validate_folder_format(&self.folder_format, self.wait_time, wait, &mut errors);
        let paths = validate_source_and_destination(&self.source, &self.destination, &mut errors);

        match (wait, format, paths) {
            (Some(wait), Some(format), Some((source, destination))) if errors.is_empty() => {
                Ok(ValidatedConfig {
                    config: self.clone(),
                    format,
                    wait,
                    source,
                    destination,
                })
            }
            _ => Err(ValidationErrors { errors }),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_wait_time() -> f64 {
    DEFAULT_WAIT_TIME
}

fn default_folder_format() -> String {
    DEFAULT_FOLDER_FORMAT.to_string()
}

/// A configuration that passed validation, with its parsed parts
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    config: WatcherConfig,
    format: FolderFormat,
    wait: Duration,
    source: PathBuf,
    destination: PathBuf,
}

impl ValidatedConfig {
    /// The configuration as supplied
    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn folder_format(&self) -> &FolderFormat {
        &self.format
    }

    /// Debounce window
    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Absolute, lexically normalized source directory
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Absolute, lexically normalized destination directory
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Field a validation failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    Name,
    WaitTime,
    FolderFormat,
    Source,
    Destination,
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigField::Name => "name",
            ConfigField::WaitTime => "wait time",
            ConfigField::FolderFormat => "folder format",
            ConfigField::Source => "source",
            ConfigField::Destination => "destination",
        };
        f.write_str(label)
    }
}

/// One configuration problem
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("wait time must be a positive number of seconds (got {0})")]
    InvalidWaitTime(f64),

    #[error("folder format is invalid: {0}")]
    InvalidFolderFormat(#[source] FormatError),

    #[error("folder format {format:?} lacks adequate precision for a wait time of {wait_time}s")]
    ImpreciseFolderFormat { format: String, wait_time: f64 },

    #[error("{field} path cannot be empty")]
    EmptyPath { field: ConfigField },

    #[error("{field} {} exists but is not a directory", path.display())]
    NotADirectory { field: ConfigField, path: PathBuf },

    #[error("{field} path {} is invalid: {source}", path.display())]
    InvalidPath {
        field: ConfigField,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source and destination paths cannot be the same")]
    SameSourceAndDestination,

    #[error("destination path cannot be inside the source path")]
    DestinationInsideSource,
}

impl ConfigError {
    /// The field this problem belongs to
    pub fn field(&self) -> ConfigField {
        match self {
            ConfigError::EmptyName => ConfigField::Name,
            ConfigError::InvalidWaitTime(_) => ConfigField::WaitTime,
            ConfigError::InvalidFolderFormat(_) | ConfigError::ImpreciseFolderFormat { .. } => {
                ConfigField::FolderFormat
            }
            ConfigError::EmptyPath { field }
            | ConfigError::NotADirectory { field, .. }
            | ConfigError::InvalidPath { field, .. } => *field,
            ConfigError::SameSourceAndDestination | ConfigError::DestinationInsideSource => {
                ConfigField::Destination
            }
        }
    }
}

/// Every problem found in one configuration
#[derive(Debug)]
pub struct ValidationErrors {
    errors: Vec<ConfigError>,
}

impl ValidationErrors {
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigError> {
        self.errors.iter()
    }

    /// Whether any problem concerns `field`
    pub fn has(&self, field: ConfigField) -> bool {
        self.errors.iter().any(|e| e.field() == field)
    }

    pub fn into_vec(self) -> Vec<ConfigError> {
        self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            1 => write!(f, "1 configuration problem:")?,
            n => write!(f, "{n} configuration problems:")?,
        }
        for error in &self.errors {
            write!(f, "\n  - {}: {}", error.field(), error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ConfigError;
    type IntoIter = std::slice::Iter<'a, ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Debounce window as a non-zero `Duration`, if `seconds` is usable
fn wait_duration(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|d| !d.is_zero())
}

/// Parse the format, check it names a directory, and check two snapshots one
/// wait time apart cannot collide.
fn validate_folder_format(
    pattern: &str,
    wait_time: f64,
    wait: Option<Duration>,
    errors: &mut Vec<ConfigError>,
) -> Option<FolderFormat> {
    let format = match FolderFormat::parse(pattern) {
        Ok(format) => format,
        Err(e) => {
            errors.push(ConfigError::InvalidFolderFormat(e));
            return None;
        }
    };

    if let Err(e) = format.check_directory_name() {
        errors.push(ConfigError::InvalidFolderFormat(e));
        return None;
    }

    // Precision is meaningless without a usable wait time
    let wait = wait?;
    match format.distinguishes(wait) {
        Ok(true) => Some(format),
        Ok(false) => {
            errors.push(ConfigError::ImpreciseFolderFormat {
                format: pattern.to_string(),
                wait_time,
            });
            None
        }
        Err(e) => {
            errors.push(ConfigError::InvalidFolderFormat(e));
            None
        }
    }
}

/// Validate both directories and their relation.
///
/// Directories are only created when the relational check passed, so a
/// rejected destination is never created inside the source.
fn validate_source_and_destination(
    source: &Path,
    destination: &Path,
    errors: &mut Vec<ConfigError>,
) -> Option<(PathBuf, PathBuf)> {
    let source_abs = absolute_dir(source, ConfigField::Source, errors);
    let destination_abs = absolute_dir(destination, ConfigField::Destination, errors);

    let related_ok = match (&source_abs, &destination_abs) {
        (Some(s), Some(d)) => check_relation(s, d, errors),
        _ => false,
    };

    let source_ok = source_abs
        .as_deref()
        .is_some_and(|p| validate_dir(p, ConfigField::Source, related_ok, errors));
    let destination_ok = destination_abs
        .as_deref()
        .is_some_and(|p| validate_dir(p, ConfigField::Destination, related_ok, errors));

    let (source_abs, destination_abs) = (source_abs?, destination_abs?);
    if !(related_ok && source_ok && destination_ok) {
        return None;
    }

    // Both exist now; canonical forms catch aliases through symlinks
    if let (Ok(s), Ok(d)) = (fs::canonicalize(&source_abs), fs::canonicalize(&destination_abs)) {
        if !check_relation(&s, &d, errors) {
            return None;
        }
    }

    Some((source_abs, destination_abs))
}

fn absolute_dir(path: &Path, field: ConfigField, errors: &mut Vec<ConfigError>) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        errors.push(ConfigError::EmptyPath { field });
        return None;
    }

    match std::path::absolute(path) {
        Ok(abs) => Some(normalize_path(&abs)),
        Err(source) => {
            errors.push(ConfigError::InvalidPath {
                field,
                path: path.to_path_buf(),
                source,
            });
            None
        }
    }
}

/// Destination must differ from source and must not live below it
fn check_relation(source: &Path, destination: &Path, errors: &mut Vec<ConfigError>) -> bool {
    if source == destination {
        errors.push(ConfigError::SameSourceAndDestination);
        false
    } else if destination.starts_with(source) {
        errors.push(ConfigError::DestinationInsideSource);
        false
    } else {
        true
    }
}

/// Check that `path` is a directory, creating it when missing and `create` is set
fn validate_dir(path: &Path, field: ConfigField, create: bool, errors: &mut Vec<ConfigError>) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => true,
        Ok(_) => {
            errors.push(ConfigError::NotADirectory {
                field,
                path: path.to_path_buf(),
            });
            false
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if !create {
                return false;
            }
            match fs::create_dir_all(path) {
                Ok(()) => {
                    info!("Created {} directory {}", field, path.display());
                    true
                }
                Err(source) => {
                    errors.push(ConfigError::InvalidPath {
                        field,
                        path: path.to_path_buf(),
                        source,
                    });
                    false
                }
            }
        }
        Err(source) => {
            errors.push(ConfigError::InvalidPath {
                field,
                path: path.to_path_buf(),
                source,
            });
            false
        }
    }
}

/// Normalize a path lexically
///
/// - Removes `.` components
/// - Resolves `..` against the preceding component
/// - `..` directly below the root stays at the root
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    out.iter().map(|c| c.as_os_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path().to_path_buf();
            Self { _temp_dir: temp_dir, root }
        }

        fn config(&self) -> WatcherConfig {
            WatcherConfig::new("Test Watcher", self.root.join("source"), self.root.join("destination"))
        }
    }

    fn errors_of(config: &WatcherConfig) -> ValidationErrors {
        config.validate().expect_err("config should be rejected")
    }

    #[test]
    fn test_valid_config_creates_directories() {
        let fixture = Fixture::new();
        let config = fixture.config();

        let validated = config.validate().unwrap();

        assert!(fixture.root.join("source").is_dir());
        assert!(fixture.root.join("destination").is_dir());
        assert_eq!(validated.name(), "Test Watcher");
        assert_eq!(validated.wait(), Duration::from_secs(1));
        assert_eq!(validated.folder_format().pattern(), DEFAULT_FOLDER_FORMAT);
        assert!(validated.source().is_absolute());
        assert_eq!(validated.config(), &config);
    }

    #[test]
    fn test_empty_name_rejected() {
        let fixture = Fixture::new();
        let mut config = fixture.config();
        config.name = String::new();

        let errors = errors_of(&config);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors.errors()[0], ConfigError::EmptyName));
        assert!(errors.to_string().contains("name cannot be empty"));
    }

    #[test]
    fn test_blank_name_accepted() {
        let fixture = Fixture::new();
        let mut config = fixture.config();
        config.name = "   ".to_string();

        let validated = config.validate().unwrap();
        assert_eq!(validated.name(), "   ");
    }

    #[test]
    fn test_non_positive_wait_time_rejected() {
        let fixture = Fixture::new();
        for wait in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = fixture.config().with_wait_time(wait);
            let errors = errors_of(&config);
            assert!(errors.has(ConfigField::WaitTime), "wait {wait} accepted");
            // Precision cannot be judged without a wait time
            assert!(!errors.has(ConfigField::FolderFormat));
        }
    }

    #[test]
    fn test_imprecise_folder_format_rejected() {
        let fixture = Fixture::new();
        let config = fixture.config().with_folder_format("%Y-%m-%d");

        let errors = errors_of(&config);
        assert!(matches!(errors.errors()[0], ConfigError::ImpreciseFolderFormat { .. }));
        assert!(errors.to_string().contains("lacks adequate precision"));
    }

    #[test]
    fn test_unparseable_folder_format_rejected() {
        let fixture = Fixture::new();
        let config = fixture.config().with_folder_format("%Y-%Q");

        let errors = errors_of(&config);
        assert!(matches!(errors.errors()[0], ConfigError::InvalidFolderFormat(_)));
    }

    #[test]
    fn test_folder_format_with_separator_rejected() {
        let fixture = Fixture::new();
        let config = fixture.config().with_folder_format("%Y/%m/%d_%H-%M-%S%.6f");

        let errors = errors_of(&config);
        assert!(matches!(
            errors.errors()[0],
            ConfigError::InvalidFolderFormat(FormatError::IllegalName { .. })
        ));
    }

    #[test]
    fn test_rejected_iff_format_collides_at_wait_time() {
        let fixture = Fixture::new();
        let formats = ["%Y-%m-%d", "%Y-%m-%d_%H-%M", "%Y-%m-%d_%H-%M-%S", "%H-%M-%S%.3f", DEFAULT_FOLDER_FORMAT];
        let waits = [0.0005, 0.5, 1.0, 59.0, 60.0, 3600.0, 86_400.0];

        for pattern in formats {
            let format = FolderFormat::parse(pattern).unwrap();
            for wait in waits {
                let d = Duration::from_secs_f64(wait);
                let collides = format.render_unix(0, 0).unwrap()
                    == format.render_unix(d.as_secs() as i64, d.subsec_nanos()).unwrap();

                let result = fixture.config().with_folder_format(pattern).with_wait_time(wait).validate();
                assert_eq!(result.is_err(), collides, "format {pattern} wait {wait}");
            }
        }
    }

    #[test]
    fn test_source_is_destination_rejected() {
        let fixture = Fixture::new();
        let mut config = fixture.config();
        config.destination = config.source.clone();

        let errors = errors_of(&config);
        assert!(errors.iter().any(|e| matches!(e, ConfigError::SameSourceAndDestination)));
        assert!(errors.to_string().contains("cannot be the same"));
    }

    #[test]
    fn test_same_path_spelled_differently_rejected() {
        let fixture = Fixture::new();
        let mut config = fixture.config();
        config.destination = fixture.root.join("source/./nested/..");

        let errors = errors_of(&config);
        assert!(errors.iter().any(|e| matches!(e, ConfigError::SameSourceAndDestination)));
    }

    #[test]
    fn test_destination_inside_source_rejected_without_creating_it() {
        let fixture = Fixture::new();
        let mut config = fixture.config();
        config.destination = config.source.join("destination");

        let errors = errors_of(&config);
        assert!(errors.iter().any(|e| matches!(e, ConfigError::DestinationInsideSource)));
        assert!(errors.to_string().contains("destination path cannot be inside the source path"));
        assert!(!config.destination.exists());
    }

    #[test]
    fn test_sibling_with_shared_prefix_accepted() {
        let fixture = Fixture::new();
        let mut config = fixture.config();
        config.destination = fixture.root.join("source-backups");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_source_inside_destination_accepted() {
        let fixture = Fixture::new();
        let mut config = fixture.config();
        config.source = fixture.root.join("destination/inner");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_source_not_directory_rejected() {
        let fixture = Fixture::new();
        let config = fixture.config();
        fs::write(&config.source, b"not a dir").unwrap();

        let errors = errors_of(&config);
        assert!(matches!(
            errors.errors()[0],
            ConfigError::NotADirectory { field: ConfigField::Source, .. }
        ));
        assert!(errors.to_string().contains("source"));
        assert!(errors.to_string().contains("exists but is not a directory"));
    }

    #[test]
    fn test_destination_not_directory_rejected() {
        let fixture = Fixture::new();
        let config = fixture.config();
        fs::write(&config.destination, b"not a dir").unwrap();

        let errors = errors_of(&config);
        assert!(errors.has(ConfigField::Destination));
        assert!(!errors.has(ConfigField::Source));
    }

    #[test]
    fn test_empty_paths_rejected() {
        let config = WatcherConfig::new("w", "", "");
        let errors = errors_of(&config);
        let empties = errors
            .iter()
            .filter(|e| matches!(e, ConfigError::EmptyPath { .. }))
            .count();
        assert_eq!(empties, 2);
    }

    #[test]
    fn test_all_independent_problems_reported_together() {
        let fixture = Fixture::new();
        let mut config = fixture.config().with_wait_time(0.0);
        config.name = String::new();
        config.destination = config.source.clone();

        let errors = errors_of(&config);
        assert!(errors.has(ConfigField::Name));
        assert!(errors.has(ConfigField::WaitTime));
        assert!(errors.has(ConfigField::Destination));
        assert_eq!(errors.len(), 3);
        assert!(errors.to_string().starts_with("3 configuration problems:"));
    }

    #[cfg(unix)]
    #[test]
    fn test_destination_symlinked_to_source_rejected() {
        let fixture = Fixture::new();
        let mut config = fixture.config();
        fs::create_dir_all(&config.source).unwrap();
        let alias = fixture.root.join("alias");
        std::os::unix::fs::symlink(&config.source, &alias).unwrap();
        config.destination = alias;

        let errors = errors_of(&config);
        assert!(errors.iter().any(|e| matches!(e, ConfigError::SameSourceAndDestination)));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let json = r#"{"name":"docs","source":"/a","destination":"/b"}"#;
        let config: WatcherConfig = serde_json::from_str(json).unwrap();
        assert!(config.enabled);
        assert_eq!(config.wait_time, DEFAULT_WAIT_TIME);
        assert_eq!(config.folder_format, DEFAULT_FOLDER_FORMAT);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
