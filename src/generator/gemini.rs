//! Google Gemini client over the `generateContent` REST endpoint.

use super::{ContentGenerator, GenerationRequest, GeneratorError};
use serde_json::{json, Value};
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model name.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// User agent for outgoing requests.
const USER_AGENT: &str = concat!("ranalone/", env!("CARGO_PKG_VERSION"));

/// Blocking Gemini client requesting JSON replies.
pub struct GeminiGenerator {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(120))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Build a client with the API key taken from `GEMINI_API_KEY`.
    pub fn from_env(endpoint: &str, model: &str) -> Result<Self, GeneratorError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GeneratorError::Unavailable(format!("{} is not set", API_KEY_ENV)))?;
        Ok(Self::new(endpoint, model, api_key))
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn body(request: &GenerationRequest) -> Value {
        let prompt = format!(
            "{}\n\nRespond in English with JSON only, shaped as: {}",
            request.prompt,
            request.kind.shape()
        );
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        })
    }
}

/// Pull the first candidate's text and parse it as JSON.
fn extract_reply(response: &Value) -> Result<Value, GeneratorError> {
    let text = response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| GeneratorError::Empty("no candidate text in response".to_string()))?;

    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(trimmed).map_err(|e| GeneratorError::Malformed(e.to_string()))
}

impl ContentGenerator for GeminiGenerator {
    fn id(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &GenerationRequest) -> Result<Value, GeneratorError> {
        tracing::debug!(model = %self.model, kind = request.kind.as_str(), "gemini request");

        let response = self
            .agent
            .post(&self.url())
            .set("x-goog-api-key", &self.api_key)
            .set("Content-Type", "application/json")
            .send_json(Self::body(request));

        match response {
            Ok(resp) => {
                let body: Value = resp
                    .into_json()
                    .map_err(|e| GeneratorError::Malformed(e.to_string()))?;
                extract_reply(&body)
            }
            Err(ureq::Error::Status(code @ (401 | 403), _)) => Err(GeneratorError::Unavailable(
                format!("HTTP {}: API key rejected", code),
            )),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(GeneratorError::RequestFailed(format!("HTTP {}: {}", code, body)))
            }
            Err(e) => Err(GeneratorError::RequestFailed(e.to_string())),
        }
    }
}
