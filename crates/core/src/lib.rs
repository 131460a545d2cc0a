//! I Saw That core - configuration, history and tree primitives
//!
//! This crate provides the synchronous building blocks of the snapshot engine:
//! - Watcher configuration and aggregated validation
//! - Folder-name templates for snapshot directories
//! - Recursive tree comparison (names, kinds, bytes, modification times)
//! - Snapshot history records and their on-disk store

pub mod backup;
pub mod config;
pub mod format;
pub mod store;
pub mod tree;

// Re-export main types for convenience
pub use backup::Backup;
pub use config::{
    ConfigError, ConfigField, ValidatedConfig, ValidationErrors, WatcherConfig, DEFAULT_WAIT_TIME,
};
pub use format::{FolderFormat, FormatError, DEFAULT_FOLDER_FORMAT};
pub use store::{MetadataStore, StoreError, METADATA_FILE};
pub use tree::{compare_trees, trees_match, CompareError, MismatchReason, TreeComparison};
