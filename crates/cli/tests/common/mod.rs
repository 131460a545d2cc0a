//! Common utilities for CLI integration tests

#![allow(dead_code)]

pub mod cli;

pub use cli::IsawthatCommand;

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Temp workspace with an empty settings file
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub settings: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let settings = temp_dir.path().join("config.toml");
        fs::write(&settings, "").expect("write settings");
        Self { temp_dir, settings }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.temp_dir.path().join(rel)
    }

    pub fn command(&self) -> IsawthatCommand {
        IsawthatCommand::new(self.temp_dir.path(), &self.settings)
    }
}
