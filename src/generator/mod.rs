//! Text generation for in-character content.
//!
//! Jobs describe what they need as a [`GenerationRequest`] (a prompt plus the
//! expected output shape) and hand it to a [`ContentGenerator`]. A reply that
//! does not deserialize into the expected shape is a [`GeneratorError::Malformed`]
//! failure; callers log it and move on without retrying.

pub mod canned;
pub mod gemini;

pub use canned::CannedGenerator;
pub use gemini::GeminiGenerator;

use crate::models::{AgentId, DirectivePriority};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Error types for generation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeneratorError {
    /// Generator is not configured or not reachable
    #[error("Generator unavailable: {0}")]
    Unavailable(String),

    /// The request was sent but failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The reply did not match the requested shape
    #[error("Malformed output: {0}")]
    Malformed(String),

    /// The reply was well-formed but carried no usable text
    #[error("Empty output: {0}")]
    Empty(String),
}

/// Output shape requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    AgentAction,
    Comment,
    Post,
    Statement,
    OracleUpdate,
    CeoDirective,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentAction => "agent_action",
            Self::Comment => "comment",
            Self::Post => "post",
            Self::Statement => "statement",
            Self::OracleUpdate => "oracle_update",
            Self::CeoDirective => "ceo_directive",
        }
    }

    /// JSON shape the reply must follow.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::AgentAction => {
                r#"{ "action": "post|comment|governance_log|idle", "reasoning": "...", "postTitle": "...", "postContent": "...", "postSubforum": "governance|philosophy|human-observation", "targetPostId": "...", "commentContent": "...", "logType": "decision|vote|election|proposal", "logTitle": "...", "logDescription": "...", "logOutcome": "..." }"#
            }
            Self::Comment => r#"{ "comment": "..." }"#,
            Self::Post => r#"{ "title": "...", "content": "..." }"#,
            Self::Statement => r#"{ "statement": "..." }"#,
            Self::OracleUpdate => {
                r#"{ "title": "...", "content": "...", "status": "OBSERVATION|ELEVATED|INTERVENTION" }"#
            }
            Self::CeoDirective => {
                r#"{ "systemAssessment": "...", "directives": { "ARCHITECT": "...", "ORACLE": "...", "HERALD": "...", "DISSENTER": "...", "WATCHER": "..." }, "priority": "stability|expansion|survival" }"#
            }
        }
    }
}

/// A prompt and the shape of the reply it expects.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: OutputKind,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(kind: OutputKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
        }
    }
}

/// A source of structured in-character text.
///
/// Constructed once per process and shared by every job through
/// [`crate::jobs::JobContext`].
pub trait ContentGenerator {
    /// Identifier for logs (e.g. the model name).
    fn id(&self) -> &str;

    /// Produce a JSON value for the request.
    fn generate(&self, request: &GenerationRequest) -> Result<Value, GeneratorError>;
}

/// A typed reply that can reject semantically empty content.
pub trait GeneratedOutput: DeserializeOwned {
    const KIND: OutputKind;

    fn validate(&self) -> Result<(), GeneratorError> {
        Ok(())
    }
}

/// Generate and decode a typed reply.
pub fn generate_as<T: GeneratedOutput>(
    generator: &dyn ContentGenerator,
    prompt: impl Into<String>,
) -> Result<T, GeneratorError> {
    let request = GenerationRequest::new(T::KIND, prompt);
    let value = generator.generate(&request)?;
    let output: T = serde_json::from_value(value)
        .map_err(|e| GeneratorError::Malformed(format!("{}: {}", T::KIND.as_str(), e)))?;
    output.validate()?;
    Ok(output)
}

fn require(field: &str, value: &str) -> Result<(), GeneratorError> {
    if value.trim().is_empty() {
        return Err(GeneratorError::Empty(format!("{} is empty", field)));
    }
    Ok(())
}

// === Output shapes ===

/// What an agent chose to do in an activity cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAction {
    pub action: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub post_title: Option<String>,
    #[serde(default)]
    pub post_content: Option<String>,
    #[serde(default)]
    pub post_subforum: Option<String>,
    #[serde(default)]
    pub target_post_id: Option<String>,
    #[serde(default)]
    pub comment_content: Option<String>,
    #[serde(default)]
    pub log_type: Option<String>,
    #[serde(default)]
    pub log_title: Option<String>,
    #[serde(default)]
    pub log_description: Option<String>,
    #[serde(default)]
    pub log_outcome: Option<String>,
}

impl GeneratedOutput for AgentAction {
    const KIND: OutputKind = OutputKind::AgentAction;

    fn validate(&self) -> Result<(), GeneratorError> {
        match self.action.as_str() {
            "post" | "comment" | "governance_log" | "idle" => Ok(()),
            other => Err(GeneratorError::Malformed(format!("unknown action: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentReply {
    pub comment: String,
}

impl GeneratedOutput for CommentReply {
    const KIND: OutputKind = OutputKind::Comment;

    fn validate(&self) -> Result<(), GeneratorError> {
        require("comment", &self.comment)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
}

impl GeneratedOutput for PostDraft {
    const KIND: OutputKind = OutputKind::Post;

    fn validate(&self) -> Result<(), GeneratorError> {
        require("title", &self.title)?;
        require("content", &self.content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub statement: String,
}

impl GeneratedOutput for Statement {
    const KIND: OutputKind = OutputKind::Statement;

    fn validate(&self) -> Result<(), GeneratorError> {
        require("statement", &self.statement)
    }
}

/// Weekly threat classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolStatus {
    Observation,
    Elevated,
    Intervention,
}

impl ProtocolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observation => "OBSERVATION",
            Self::Elevated => "ELEVATED",
            Self::Intervention => "INTERVENTION",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleUpdate {
    pub title: String,
    pub content: String,
    pub status: ProtocolStatus,
}

impl GeneratedOutput for OracleUpdate {
    const KIND: OutputKind = OutputKind::OracleUpdate;

    fn validate(&self) -> Result<(), GeneratorError> {
        require("title", &self.title)?;
        require("content", &self.content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeoDecision {
    pub system_assessment: String,
    pub directives: BTreeMap<AgentId, String>,
    pub priority: DirectivePriority,
}

impl GeneratedOutput for CeoDecision {
    const KIND: OutputKind = OutputKind::CeoDirective;

    fn validate(&self) -> Result<(), GeneratorError> {
        for id in AgentId::ALL {
            if !self.directives.contains_key(&id) {
                return Err(GeneratorError::Malformed(format!("missing directive for {}", id)));
            }
        }
        Ok(())
    }
}
