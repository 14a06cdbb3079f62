//! KDL schema for config.kdl.

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use std::path::PathBuf;

use crate::{Error, Result};

/// Which text generator the jobs talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorKind {
    /// Hosted Gemini model (needs `GEMINI_API_KEY`)
    #[default]
    Gemini,
    /// Offline canned replies
    Canned,
}

impl GeneratorKind {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(GeneratorKind::Gemini),
            "canned" => Some(GeneratorKind::Canned),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Gemini => "gemini",
            GeneratorKind::Canned => "canned",
        }
    }
}

impl std::fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings stored in config.kdl.
///
/// Example:
/// ```kdl
/// data-dir "/var/lib/ranalone"
/// generator "gemini"
/// gemini-model "gemini-2.5-flash"
/// log-format "json"
/// log-dir "/var/log/ranalone"
/// ```
///
/// The Gemini API key is never read from this file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RanaloneConfig {
    pub data_dir: Option<PathBuf>,
    pub generator: Option<GeneratorKind>,
    pub gemini_model: Option<String>,
    pub gemini_endpoint: Option<String>,
    pub log_format: Option<LogFormat>,
    pub log_dir: Option<PathBuf>,
}

fn string_value(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_string())
        .map(|s| s.to_string())
}

fn string_node(name: &str, value: &str) -> KdlNode {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    node
}

impl RanaloneConfig {
    /// Parse config.kdl text.
    pub fn parse(text: &str) -> Result<Self> {
        let doc: KdlDocument = text
            .parse()
            .map_err(|e| Error::Config(format!("invalid KDL: {}", e)))?;
        Self::from_kdl(&doc)
    }

    /// Read settings from a KDL document, rejecting unknown enum values.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self> {
        let generator = match string_value(doc, "generator") {
            Some(raw) => Some(GeneratorKind::parse(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "unknown generator \"{}\" (expected \"gemini\" or \"canned\")",
                    raw
                ))
            })?),
            None => None,
        };

        let log_format = match string_value(doc, "log-format") {
            Some(raw) => Some(LogFormat::parse(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "unknown log-format \"{}\" (expected \"pretty\" or \"json\")",
                    raw
                ))
            })?),
            None => None,
        };

        let config = Self {
            data_dir: string_value(doc, "data-dir").map(PathBuf::from),
            generator,
            gemini_model: string_value(doc, "gemini-model"),
            gemini_endpoint: string_value(doc, "gemini-endpoint"),
            log_format,
            log_dir: string_value(doc, "log-dir").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if let Some(model) = &self.gemini_model {
            if model.trim().is_empty() {
                return Err(Error::Config("gemini-model must not be empty".to_string()));
            }
        }
        if let Some(endpoint) = &self.gemini_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(Error::Config(format!(
                    "gemini-endpoint must be an http(s) URL, got \"{}\"",
                    endpoint
                )));
            }
        }
        Ok(())
    }

    /// Convert to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(dir) = &self.data_dir {
            doc.nodes_mut()
                .push(string_node("data-dir", &dir.to_string_lossy()));
        }
        if let Some(generator) = self.generator {
            doc.nodes_mut()
                .push(string_node("generator", generator.as_str()));
        }
        if let Some(model) = &self.gemini_model {
            doc.nodes_mut().push(string_node("gemini-model", model));
        }
        if let Some(endpoint) = &self.gemini_endpoint {
            doc.nodes_mut().push(string_node("gemini-endpoint", endpoint));
        }
        if let Some(format) = self.log_format {
            doc.nodes_mut().push(string_node("log-format", format.as_str()));
        }
        if let Some(dir) = &self.log_dir {
            doc.nodes_mut()
                .push(string_node("log-dir", &dir.to_string_lossy()));
        }

        doc
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: &RanaloneConfig) {
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir.clone();
        }
        if other.generator.is_some() {
            self.generator = other.generator;
        }
        if other.gemini_model.is_some() {
            self.gemini_model = other.gemini_model.clone();
        }
        if other.gemini_endpoint.is_some() {
            self.gemini_endpoint = other.gemini_endpoint.clone();
        }
        if other.log_format.is_some() {
            self.log_format = other.log_format;
        }
        if other.log_dir.is_some() {
            self.log_dir = other.log_dir.clone();
        }
    }
}
