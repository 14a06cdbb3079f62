//! Configuration for RANALONE.
//!
//! ## config.kdl
//!
//! Located at (first match wins):
//! - `--config FILE`
//! - `$RANALONE_CONFIG`
//! - `~/.config/ranalone/config.kdl`
//!
//! Contains:
//! - `data-dir` - Directory holding `ranalone.db`
//! - `generator` - "gemini" or "canned"
//! - `gemini-model` / `gemini-endpoint` - Hosted model settings
//! - `log-format` - "pretty" or "json"
//! - `log-dir` - Directory for the daily rolling log file
//!
//! The Gemini API key is only read from `GEMINI_API_KEY`.
//!
//! ## Precedence
//!
//! CLI flag > environment variable > config.kdl > defaults.
//! Use the [`resolver`] module for unified precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, Resolved, ResolvedConfig, ValueSource, default_config_path,
    default_data_dir, resolve_config, resolve_config_with,
};
pub use schema::{GeneratorKind, LogFormat, RanaloneConfig};
