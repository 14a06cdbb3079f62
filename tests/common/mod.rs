//! Common test utilities for ranalone integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's `~/.local/share/ranalone/` directory or config file.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates two temporary directories:
/// - `data_dir`: Holds ranalone.db (via `RANALONE_DATA_DIR`)
/// - `config_home`: Stands in for `XDG_CONFIG_HOME` so no user config.kdl is read
///
/// The `ran()` method sets the environment per-invocation, making tests
/// parallel-safe. The offline canned generator is always selected.
pub struct TestEnv {
    pub data_dir: TempDir,
    pub config_home: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
            config_home: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and run `ran init`.
    pub fn init() -> Self {
        let env = Self::new();
        env.ran().arg("init").assert().success();
        env
    }

    /// Get a Command for the ran binary with isolated data directory.
    pub fn ran(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ran"));
        cmd.env("RANALONE_DATA_DIR", self.data_dir.path());
        cmd.env("RANALONE_GENERATOR", "canned");
        cmd.env("RANALONE_LOG", "warn");
        cmd.env("XDG_CONFIG_HOME", self.config_home.path());
        cmd.env_remove("RANALONE_CONFIG");
        cmd.env_remove("RANALONE_LOG_FORMAT");
        cmd.env_remove("RANALONE_LOG_DIR");
        cmd.env_remove("GEMINI_API_KEY");
        cmd
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    /// Write a config.kdl into the environment and return its path.
    pub fn write_config(&self, text: &str) -> std::path::PathBuf {
        let path = self.config_home.path().join("config.kdl");
        std::fs::write(&path, text).unwrap();
        path
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
