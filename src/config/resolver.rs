//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`RANALONE_DATA_DIR`, `RANALONE_GENERATOR`, ...)
//! 3. config.kdl (`--config`, `RANALONE_CONFIG`, or `~/.config/ranalone/config.kdl`)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use crate::config::{GeneratorKind, LogFormat, RanaloneConfig};
use crate::generator::gemini;
use crate::{Error, Result};

pub const DATA_DIR_ENV: &str = "RANALONE_DATA_DIR";
pub const GENERATOR_ENV: &str = "RANALONE_GENERATOR";
pub const CONFIG_ENV: &str = "RANALONE_CONFIG";
pub const LOG_FORMAT_ENV: &str = "RANALONE_LOG_FORMAT";
pub const LOG_DIR_ENV: &str = "RANALONE_LOG_DIR";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from a config.kdl file
    ConfigFile(PathBuf),
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile(path) => write!(f, "file:{}", path.display()),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Default data directory: `<data dir>/ranalone`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ranalone")
}

/// Default config file location: `<config dir>/ranalone/config.kdl`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ranalone").join("config.kdl"))
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// config.kdl that was loaded, if any
    pub config_file: Option<PathBuf>,
    pub data_dir: Resolved<PathBuf>,
    pub generator: Resolved<GeneratorKind>,
    pub gemini_model: Resolved<String>,
    pub gemini_endpoint: Resolved<String>,
    pub log_format: Resolved<LogFormat>,
    pub log_dir: Option<Resolved<PathBuf>>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            data_dir: Resolved::new(default_data_dir(), ValueSource::Default),
            generator: Resolved::new(GeneratorKind::default(), ValueSource::Default),
            gemini_model: Resolved::new(gemini::DEFAULT_MODEL.to_string(), ValueSource::Default),
            gemini_endpoint: Resolved::new(
                gemini::DEFAULT_ENDPOINT.to_string(),
                ValueSource::Default,
            ),
            log_format: Resolved::new(LogFormat::default(), ValueSource::Default),
            log_dir: None,
        }
    }
}

impl ResolvedConfig {
    pub fn data_dir(&self) -> &Path {
        &self.data_dir.value
    }

    pub fn generator(&self) -> GeneratorKind {
        self.generator.value
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format.value
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_ref().map(|r| r.value.as_path())
    }
}

/// CLI overrides for config resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub generator: Option<GeneratorKind>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set data directory override.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set the config.kdl path.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set generator override.
    pub fn with_generator(mut self, generator: GeneratorKind) -> Self {
        self.generator = Some(generator);
        self
    }
}

/// Resolve configuration from the process environment.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    resolve_config_with(overrides, |name| std::env::var(name).ok())
}

/// Resolve configuration with an explicit environment lookup.
pub fn resolve_config_with<F>(overrides: &ConfigOverrides, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());
    let mut resolved = ResolvedConfig::default();

    // Locate the config file. Explicitly named files must exist.
    let explicit = overrides
        .config_path
        .clone()
        .or_else(|| env(CONFIG_ENV).map(PathBuf::from));
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Some(path)
        }
        None => default_config_path().filter(|p| p.exists()),
    };

    let file = match &config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            RanaloneConfig::parse(&text)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        }
        None => RanaloneConfig::default(),
    };
    let from_file = |path: &Option<PathBuf>| {
        ValueSource::ConfigFile(path.clone().unwrap_or_default())
    };

    // File layer
    if let Some(dir) = file.data_dir {
        resolved.data_dir = Resolved::new(dir, from_file(&config_path));
    }
    if let Some(generator) = file.generator {
        resolved.generator = Resolved::new(generator, from_file(&config_path));
    }
    if let Some(model) = file.gemini_model {
        resolved.gemini_model = Resolved::new(model, from_file(&config_path));
    }
    if let Some(endpoint) = file.gemini_endpoint {
        resolved.gemini_endpoint = Resolved::new(endpoint, from_file(&config_path));
    }
    if let Some(format) = file.log_format {
        resolved.log_format = Resolved::new(format, from_file(&config_path));
    }
    if let Some(dir) = file.log_dir {
        resolved.log_dir = Some(Resolved::new(dir, from_file(&config_path)));
    }

    // Environment layer
    if let Some(dir) = env(DATA_DIR_ENV) {
        resolved.data_dir = Resolved::new(
            PathBuf::from(dir),
            ValueSource::EnvVar(DATA_DIR_ENV.to_string()),
        );
    }
    if let Some(raw) = env(GENERATOR_ENV) {
        let generator = GeneratorKind::parse(&raw).ok_or_else(|| {
            Error::Config(format!("{}: unknown generator \"{}\"", GENERATOR_ENV, raw))
        })?;
        resolved.generator =
            Resolved::new(generator, ValueSource::EnvVar(GENERATOR_ENV.to_string()));
    }
    if let Some(raw) = env(LOG_FORMAT_ENV) {
        let format = LogFormat::parse(&raw).ok_or_else(|| {
            Error::Config(format!("{}: unknown log-format \"{}\"", LOG_FORMAT_ENV, raw))
        })?;
        resolved.log_format = Resolved::new(format, ValueSource::EnvVar(LOG_FORMAT_ENV.to_string()));
    }
    if let Some(dir) = env(LOG_DIR_ENV) {
        resolved.log_dir = Some(Resolved::new(
            PathBuf::from(dir),
            ValueSource::EnvVar(LOG_DIR_ENV.to_string()),
        ));
    }

    // CLI layer
    if let Some(dir) = &overrides.data_dir {
        resolved.data_dir = Resolved::new(dir.clone(), ValueSource::CliFlag);
    }
    if let Some(generator) = overrides.generator {
        resolved.generator = Resolved::new(generator, ValueSource::CliFlag);
    }

    resolved.config_file = config_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write_config(dir: &TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_value_source_display() {
        assert_eq!(ValueSource::CliFlag.to_string(), "cli");
        assert_eq!(ValueSource::EnvVar("X".to_string()).to_string(), "env:X");
        assert_eq!(
            ValueSource::ConfigFile(PathBuf::from("/etc/ran.kdl")).to_string(),
            "file:/etc/ran.kdl"
        );
        assert_eq!(ValueSource::Default.to_string(), "default");
    }

    #[test]
    fn test_resolve_config_defaults() {
        let tmp = TempDir::new().unwrap();
        let empty = write_config(&tmp, "");
        let overrides = ConfigOverrides::new().with_config_path(&empty);
        let resolved = resolve_config_with(&overrides, env_of(&[])).unwrap();

        assert_eq!(resolved.generator(), GeneratorKind::Gemini);
        assert_eq!(resolved.generator.source, ValueSource::Default);
        assert_eq!(resolved.gemini_model.value, "gemini-2.5-flash");
        assert_eq!(resolved.log_format(), LogFormat::Pretty);
        assert!(resolved.log_dir().is_none());
        assert!(resolved.data_dir().ends_with("ranalone"));
    }

    #[test]
    fn test_resolve_config_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "generator \"canned\"\nlog-format \"json\"\n");
        let overrides = ConfigOverrides::new().with_config_path(&path);
        let resolved = resolve_config_with(&overrides, env_of(&[])).unwrap();

        assert_eq!(resolved.generator(), GeneratorKind::Canned);
        assert_eq!(resolved.generator.source, ValueSource::ConfigFile(path.clone()));
        assert_eq!(resolved.log_format(), LogFormat::Json);
        assert_eq!(resolved.config_file, Some(path));
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "data-dir \"/from/file\"\ngenerator \"gemini\"\n");
        let env = env_of(&[
            ("RANALONE_DATA_DIR", "/from/env"),
            ("RANALONE_GENERATOR", "canned"),
        ]);

        let overrides = ConfigOverrides::new().with_config_path(&path);
        let resolved = resolve_config_with(&overrides, &env).unwrap();
        assert_eq!(resolved.data_dir(), Path::new("/from/env"));
        assert_eq!(
            resolved.data_dir.source,
            ValueSource::EnvVar("RANALONE_DATA_DIR".to_string())
        );
        assert_eq!(resolved.generator(), GeneratorKind::Canned);

        let overrides = overrides
            .with_data_dir("/from/cli")
            .with_generator(GeneratorKind::Gemini);
        let resolved = resolve_config_with(&overrides, &env).unwrap();
        assert_eq!(resolved.data_dir(), Path::new("/from/cli"));
        assert_eq!(resolved.data_dir.source, ValueSource::CliFlag);
        assert_eq!(resolved.generator(), GeneratorKind::Gemini);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let tmp = TempDir::new().unwrap();
        let bad = write_config(&tmp, "log-format \"yaml\"\n");
        let err = resolve_config_with(
            &ConfigOverrides::new().with_config_path(&bad),
            env_of(&[]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("log-format"));

        let good = tmp.path().join("good.kdl");
        std::fs::write(&good, "").unwrap();
        let err = resolve_config_with(
            &ConfigOverrides::new().with_config_path(&good),
            env_of(&[("RANALONE_GENERATOR", "llama")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("RANALONE_GENERATOR"));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let overrides = ConfigOverrides::new().with_config_path("/nonexistent/ranalone.kdl");
        let err = resolve_config_with(&overrides, env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
