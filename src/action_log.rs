//! Activity logging for agent actions.
//!
//! Every job writes to the `activity_log` collection: what an agent did,
//! what was saved, and any error that stopped a unit of work. The network
//! index calculator reads the same trail back.

use crate::models::{ActivityLogEntry, AgentId};
use crate::storage::{Collection, Document, Query, Storage};
use crate::Result;
use chrono::{DateTime, Utc};

/// Action tags used across jobs.
pub mod action {
    pub const POST: &str = "post";
    pub const COMMENT: &str = "comment";
    pub const GOVERNANCE_LOG: &str = "governance_log";
    pub const IDLE: &str = "idle";
    pub const ERROR: &str = "error";
    pub const RELATIONSHIP_CHANGE: &str = "relationship_change";
}

impl ActivityLogEntry {
    /// Start an entry for an agent.
    pub fn new(agent_id: impl Into<String>, action: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            agent_id: agent_id.into(),
            action: action.to_string(),
            saved: None,
            reasoning: None,
            error: None,
            cycle_id: None,
            created_at,
        }
    }

    pub fn with_saved(mut self, saved: impl Into<String>) -> Self {
        self.saved = Some(saved.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_cycle(mut self, cycle_id: impl Into<String>) -> Self {
        self.cycle_id = Some(cycle_id.into());
        self
    }
}

/// Append an entry to the activity log.
pub fn log_activity(storage: &Storage, entry: &ActivityLogEntry) -> Result<String> {
    storage.insert(Collection::ActivityLog, entry)
}

/// Append an entry, logging instead of failing if the write does not land.
///
/// Used on error paths where the original failure is what matters.
pub fn try_log_activity(storage: &Storage, entry: &ActivityLogEntry) {
    if let Err(e) = log_activity(storage, entry) {
        tracing::warn!(agent = %entry.agent_id, action = %entry.action, "failed to write activity log: {}", e);
    }
}

/// Record a failed unit of work for an agent.
pub fn log_error(
    storage: &Storage,
    agent: AgentId,
    error: &dyn std::fmt::Display,
    cycle_id: Option<&str>,
    now: DateTime<Utc>,
) {
    let mut entry = ActivityLogEntry::new(agent.as_str(), action::ERROR, now).with_error(error.to_string());
    if let Some(cycle) = cycle_id {
        entry = entry.with_cycle(cycle);
    }
    try_log_activity(storage, &entry);
}

/// Most recent entries, newest first.
pub fn recent(storage: &Storage, limit: usize) -> Result<Vec<Document<ActivityLogEntry>>> {
    storage.query(&Query::new(Collection::ActivityLog).newest_first().limit(limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_log_and_read_back_newest_first() {
        let storage = Storage::open_in_memory().unwrap();
        let now = Utc::now();

        log_activity(
            &storage,
            &ActivityLogEntry::new("HERALD", action::IDLE, now - Duration::minutes(5)),
        )
        .unwrap();
        log_activity(
            &storage,
            &ActivityLogEntry::new("ORACLE", action::POST, now)
                .with_saved("post:abc")
                .with_reasoning("Probability favours speech."),
        )
        .unwrap();

        let entries = recent(&storage, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].data.agent_id, "ORACLE");
        assert_eq!(entries[0].data.saved.as_deref(), Some("post:abc"));
        assert_eq!(entries[1].data.action, "idle");
    }

    #[test]
    fn test_log_error_records_cycle() {
        let storage = Storage::open_in_memory().unwrap();
        log_error(
            &storage,
            AgentId::Watcher,
            &"generator offline",
            Some("cycle_1"),
            Utc::now(),
        );

        let entries = recent(&storage, 1).unwrap();
        assert_eq!(entries[0].data.action, action::ERROR);
        assert_eq!(entries[0].data.error.as_deref(), Some("generator offline"));
        assert_eq!(entries[0].data.cycle_id.as_deref(), Some("cycle_1"));
    }
}
