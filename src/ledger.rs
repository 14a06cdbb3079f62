//! Relationship ledger.
//!
//! Each agent's memory holds a signed score toward every other agent. Scores
//! live in [-100, 100] and the status label is always derived from the score.
//! Older records may store only a label; [`normalize`] upgrades them.
//!
//! Writes are read-modify-write on the subject's memory document with no
//! cross-job locking, so two jobs adjusting the same pair at once may lose one
//! of the deltas.

use crate::action_log::{self, action};
use crate::models::{
    ActivityLogEntry, AgentId, AgentMemory, RelationshipEntry, RelationshipStatus,
    RelationshipValue,
};
use crate::storage::{Collection, Storage};
use crate::Result;
use chrono::{DateTime, Utc};
use std::fmt;

pub const MIN_SCORE: i32 = -100;
pub const MAX_SCORE: i32 = 100;

/// Score change applied by one attack or support.
pub const STEP: i32 = 10;

/// Derive the status label for a score.
pub fn score_to_status(score: i32) -> RelationshipStatus {
    if score >= 50 {
        RelationshipStatus::Allied
    } else if score >= 10 {
        RelationshipStatus::Friendly
    } else if score >= -9 {
        RelationshipStatus::Neutral
    } else if score >= -49 {
        RelationshipStatus::Wary
    } else {
        RelationshipStatus::Hostile
    }
}

/// Score for a label-only legacy record. Unknown labels map to 0.
pub fn legacy_score(label: &str) -> i32 {
    match label.to_lowercase().as_str() {
        "allied" => 70,
        "friendly" => 30,
        "curious" => 20,
        "neutral" => 0,
        "wary" => -30,
        "suspicious" => -40,
        "hostile" => -80,
        "monitoring" => -10,
        _ => 0,
    }
}

/// Build an entry from a score, clamping it into range.
pub fn entry_for(score: i32) -> RelationshipEntry {
    let score = score.clamp(MIN_SCORE, MAX_SCORE);
    RelationshipEntry {
        status: score_to_status(score),
        score,
    }
}

/// Turn a stored value (or its absence) into a normalized entry.
pub fn normalize(value: Option<&RelationshipValue>) -> RelationshipEntry {
    match value {
        None => entry_for(0),
        Some(RelationshipValue::Legacy(label)) => entry_for(legacy_score(label)),
        Some(RelationshipValue::Scored { score, .. }) => entry_for(*score),
    }
}

/// The subject's normalized relationship toward `object`.
pub fn relationship(memory: &AgentMemory, object: AgentId) -> RelationshipEntry {
    normalize(memory.relationships.get(&object))
}

/// Direction of a relationship adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Attack,
    Support,
}

impl Direction {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "attack" => Some(Self::Attack),
            "support" => Some(Self::Support),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Support => "support",
        }
    }

    /// Signed score change.
    pub fn delta(&self) -> i32 {
        match self {
            Self::Attack => -STEP,
            Self::Support => STEP,
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            Self::Attack => "attacked",
            Self::Support => "supported",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format a score with an explicit sign for positive values.
pub fn signed(score: i32) -> String {
    if score > 0 {
        format!("+{}", score)
    } else {
        score.to_string()
    }
}

/// Load an agent's memory, if it has one.
pub fn load_memory(storage: &Storage, agent: AgentId) -> Result<Option<AgentMemory>> {
    storage.get(Collection::AgentMemory, agent.as_str())
}

/// Move `subject`'s score toward `object` by one step.
///
/// Returns the new entry, or `None` (and writes nothing) if the subject has
/// no memory record.
pub fn adjust_relationship(
    storage: &Storage,
    subject: AgentId,
    object: AgentId,
    direction: Direction,
    now: DateTime<Utc>,
) -> Result<Option<RelationshipEntry>> {
    let mut before = entry_for(0);
    let mut after = entry_for(0);

    let updated = storage.update::<AgentMemory, _>(
        Collection::AgentMemory,
        subject.as_str(),
        |memory| {
            before = relationship(memory, object);
            after = entry_for(before.score + direction.delta());
            memory.relationships.insert(object, after.into());
            memory.last_updated = now;
        },
    )?;

    if updated.is_none() {
        tracing::debug!(%subject, "no memory record, relationship unchanged");
        return Ok(None);
    }

    tracing::info!(
        "[relationship] {} {} {}: {}({}) -> {}({})",
        subject,
        direction.past_tense(),
        object,
        before.status,
        before.score,
        after.status,
        after.score
    );

    let summary = format!(
        "{} {} {}. Relationship: {} ({})",
        subject,
        direction.past_tense(),
        object,
        after.status,
        signed(after.score)
    );
    action_log::log_activity(
        storage,
        &ActivityLogEntry::new(subject.as_str(), action::RELATIONSHIP_CHANGE, now).with_saved(summary),
    )?;

    Ok(Some(after))
}

/// Prepend a decision summary to an agent's memory, keeping the newest five.
///
/// Returns `false` (and writes nothing) if the agent has no memory record.
pub fn record_decision(
    storage: &Storage,
    agent: AgentId,
    summary: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let updated = storage.update::<AgentMemory, _>(
        Collection::AgentMemory,
        agent.as_str(),
        |memory| {
            memory.push_decision(summary);
            memory.last_updated = now;
        },
    )?;
    Ok(updated.is_some())
}

/// Render memory as a prompt preamble. Empty without a memory record.
pub fn memory_block(memory: Option<&AgentMemory>) -> String {
    let Some(memory) = memory else {
        return String::new();
    };

    let decisions = if memory.recent_decisions.is_empty() {
        "  No prior decisions recorded.".to_string()
    } else {
        memory
            .recent_decisions
            .iter()
            .take(3)
            .enumerate()
            .map(|(i, d)| format!("  {}. {}", i + 1, d))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let relationships = memory
        .relationships
        .iter()
        .map(|(id, value)| {
            let rel = normalize(Some(value));
            format!("- {}: {} (score: {})", id, rel.status, signed(rel.score))
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "--- MEMORY CONTEXT ---\n\
         Your current goal: {}\n\
         Your emotional state: {}\n\
         Your recent decisions:\n{}\n\
         Your relationships:\n{}\n\
         Act accordingly: attack enemies (hostile/wary), support allies (allied/friendly).\n\
         --- END MEMORY ---\n\n",
        memory.current_goal, memory.emotional_state, decisions, relationships
    )
}
