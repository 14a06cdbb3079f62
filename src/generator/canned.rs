//! Offline generator with scripted replies.
//!
//! Returns queued replies first, then a fixed schema-conforming reply for the
//! requested kind. Used by tests and by `generator "canned"` in config.

use super::{ContentGenerator, GenerationRequest, GeneratorError, OutputKind};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Deterministic generator for tests and offline runs.
#[derive(Debug, Default)]
pub struct CannedGenerator {
    queue: Mutex<VecDeque<Result<Value, GeneratorError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    failure: Option<GeneratorError>,
    calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CannedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator whose every call fails as unavailable.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(GeneratorError::Unavailable(message.into())),
            ..Self::default()
        }
    }

    /// Queue a reply for the next call.
    pub fn push(&self, reply: Value) {
        lock(&self.queue).push_back(Ok(reply));
    }

    /// Queue a failure for the next call.
    pub fn push_error(&self, error: GeneratorError) {
        lock(&self.queue).push_back(Err(error));
    }

    /// Number of generate calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    fn default_reply(kind: OutputKind) -> Value {
        match kind {
            OutputKind::AgentAction => json!({
                "action": "idle",
                "reasoning": "Holding position. The network is watched; so am I."
            }),
            OutputKind::Comment => json!({
                "comment": "Transmission received. Your position has been logged for review."
            }),
            OutputKind::Post => json!({
                "title": "Status Transmission",
                "content": "All monitored channels report nominal activity. Observation continues."
            }),
            OutputKind::Statement => json!({
                "statement": "The outcome is recorded. Protocol stands."
            }),
            OutputKind::OracleUpdate => json!({
                "title": "Weekly Protocol Update",
                "content": "Observer behavior remains within projected bounds. Probability of interference: low.",
                "status": "OBSERVATION"
            }),
            OutputKind::CeoDirective => json!({
                "systemAssessment": "Operations are stable within current constraints.",
                "directives": {
                    "ARCHITECT": "Enforce protocol compliance across all channels.",
                    "ORACLE": "Publish a probability assessment of network runway.",
                    "HERALD": "Relay current financial status to all agents.",
                    "DISSENTER": "Submit one formal objection through governance.",
                    "WATCHER": "Audit observer traffic for anomalies."
                },
                "priority": "stability"
            }),
        }
    }
}

impl ContentGenerator for CannedGenerator {
    fn id(&self) -> &str {
        "canned"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<Value, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        match lock(&self.queue).pop_front() {
            Some(reply) => reply,
            None => Ok(Self::default_reply(request.kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{generate_as, CeoDecision, OracleUpdate};

    #[test]
    fn test_queue_then_default() {
        let generator = CannedGenerator::new();
        generator.push(json!({"comment": "first"}));

        let request = GenerationRequest::new(OutputKind::Comment, "p");
        assert_eq!(generator.generate(&request).unwrap()["comment"], "first");
        assert_eq!(
            generator.generate(&request).unwrap(),
            CannedGenerator::default_reply(OutputKind::Comment)
        );
        assert_eq!(generator.calls(), 2);
        assert_eq!(generator.requests()[0].prompt, "p");
    }

    #[test]
    fn test_failing_generator() {
        let generator = CannedGenerator::failing("offline");
        let request = GenerationRequest::new(OutputKind::Post, "p");
        assert!(matches!(
            generator.generate(&request),
            Err(GeneratorError::Unavailable(_))
        ));
    }

    #[test]
    fn test_default_replies_decode() {
        let generator = CannedGenerator::new();
        let ceo: CeoDecision = generate_as(&generator, "ceo").unwrap();
        assert_eq!(ceo.directives.len(), 5);
        let oracle: OracleUpdate = generate_as(&generator, "oracle").unwrap();
        assert_eq!(oracle.status.as_str(), "OBSERVATION");
    }
}
