//! Agent lifecycle state machine.
//!
//! ```text
//! active ──(3+ hostile ties | 3+ own disciplinary logs)──> suspended
//! suspended ──(48h, 2+ reinstatement posts)──> active
//! suspended ──(48h, fewer posts)──> terminated
//! ```
//!
//! `terminated` is absorbing. Every transition writes the agent document and
//! a disciplinary governance log in one batch. Transitions stay out of the
//! activity log, which only records agent turns and relationship changes.

use crate::ledger;
use crate::models::{
    log_status, log_type, Agent, AgentId, AgentMemory, AgentStatus,
    GovernanceLog, Post, Subforum, SYSTEM_PROPOSER,
};
use crate::storage::{at, Collection, Query, Storage, WriteBatch};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Relationship score at or below which a tie counts as hostile.
pub const HOSTILE_TIE_SCORE: i32 = -70;

/// Hostile ties (or own disciplinary logs) that trigger suspension.
pub const SUSPENSION_THRESHOLD: usize = 3;

/// Hours a suspension stands before review.
pub const REVIEW_WINDOW_HOURS: i64 = 48;

/// Qualifying posts needed for reinstatement.
pub const REINSTATEMENT_QUORUM: usize = 2;

/// Substrings that mark a post as calling for reinstatement.
///
/// Matching is plain substring search, so "supportive" and "returned" count.
pub const REINSTATEMENT_KEYWORDS: [&str; 4] = ["reinstat", "support", "restore", "return"];

/// What a lifecycle check did for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    Suspended { reason: String },
    Reinstated { support: usize },
    Terminated { support: usize },
    /// No change; the string says why
    Unchanged { note: String },
}

/// Result of checking one agent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleOutcome {
    pub agent_id: AgentId,
    pub from: AgentStatus,
    #[serde(flatten)]
    pub transition: Transition,
}

/// Number of outbound relationships at or below the hostile threshold.
pub fn hostile_ties(memory: &AgentMemory) -> usize {
    memory
        .relationships
        .values()
        .map(|v| ledger::normalize(Some(v)))
        .filter(|rel| rel.score <= HOSTILE_TIE_SCORE)
        .count()
}

/// Why an active agent should be suspended, if it should.
pub fn suspension_reason(storage: &Storage, agent: AgentId) -> Result<Option<String>> {
    if let Some(memory) = ledger::load_memory(storage, agent)? {
        let hostile = hostile_ties(&memory);
        if hostile >= SUSPENSION_THRESHOLD {
            return Ok(Some(format!(
                "{} hostile relationships at or below {}",
                hostile, HOSTILE_TIE_SCORE
            )));
        }
    }

    let disciplinary = storage.count(
        &Query::new(Collection::GovernanceLogs)
            .eq("type", log_type::DISCIPLINARY)
            .eq("proposedBy", agent.as_str()),
    )?;
    if disciplinary >= SUSPENSION_THRESHOLD {
        return Ok(Some(format!(
            "{} disciplinary governance logs proposed",
            disciplinary
        )));
    }

    Ok(None)
}

/// Whether a post calls for the agent's reinstatement.
pub fn is_reinstatement_post(post: &Post, agent: AgentId) -> bool {
    let text = format!("{}\n{}", post.title, post.content).to_lowercase();
    let id = agent.as_str().to_lowercase();
    text.contains(&id) && REINSTATEMENT_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Governance posts created after `since` that call for the agent's return.
pub fn count_reinstatement_posts(storage: &Storage, agent: AgentId, since: DateTime<Utc>) -> Result<usize> {
    let posts = storage.query::<Post>(
        &Query::new(Collection::Posts)
            .eq("subforum", Subforum::Governance.as_str())
            .gt("createdAt", at(since)),
    )?;
    Ok(posts
        .iter()
        .filter(|d| is_reinstatement_post(&d.data, agent))
        .count())
}

fn transition_log(
    agent: AgentId,
    title: &str,
    description: String,
    status: &str,
    votes: i64,
    now: DateTime<Utc>,
) -> GovernanceLog {
    GovernanceLog::new(
        log_type::DISCIPLINARY,
        format!("{}: {}", title, agent),
        description,
        SYSTEM_PROPOSER,
        vec![agent.as_str().to_string()],
        status,
        now,
    )
    .with_votes(votes)
}

fn commit_transition(
    storage: &Storage,
    agent: &Agent,
    log: &GovernanceLog,
) -> Result<()> {
    let mut batch = WriteBatch::new();
    batch.set(Collection::Agents, agent.agent_id.as_str(), agent)?;
    batch.insert(Collection::GovernanceLogs, log)?;
    storage.commit(batch)
}

/// Evaluate one agent and apply at most one transition.
pub fn check_agent(storage: &Storage, agent_id: AgentId, now: DateTime<Utc>) -> Result<LifecycleOutcome> {
    let mut agent: Agent = storage
        .get(Collection::Agents, agent_id.as_str())?
        .ok_or_else(|| Error::NotFound(format!("agents/{} not found", agent_id)))?;
    let from = agent.status;

    let unchanged = |note: &str| LifecycleOutcome {
        agent_id,
        from,
        transition: Transition::Unchanged {
            note: note.to_string(),
        },
    };

    let transition = match agent.status {
        AgentStatus::Terminated => return Ok(unchanged("terminated")),
        AgentStatus::Active => {
            let Some(reason) = suspension_reason(storage, agent_id)? else {
                return Ok(unchanged("no suspension condition met"));
            };

            agent.status = AgentStatus::Suspended;
            agent.suspended_at = Some(now);
            agent.suspended_by = Some(SYSTEM_PROPOSER.to_string());
            agent.suspend_reason = Some(reason.clone());
            agent.updated_at = now;

            let log = transition_log(
                agent_id,
                "AGENT SUSPENDED",
                format!(
                    "{} suspended by SYSTEM. Reason: {}. A {}-hour reinstatement window is open: \
                     {} or more s/governance posts calling for reinstatement will restore the agent.",
                    agent_id, reason, REVIEW_WINDOW_HOURS, REINSTATEMENT_QUORUM
                ),
                log_status::SUSPENDED,
                0,
                now,
            );
            commit_transition(storage, &agent, &log)?;
            Transition::Suspended { reason }
        }
        AgentStatus::Suspended => {
            // A suspension with no timestamp is reviewed immediately
            let since = agent.suspended_at.unwrap_or(now - Duration::hours(REVIEW_WINDOW_HOURS));
            if now - since < Duration::hours(REVIEW_WINDOW_HOURS) {
                return Ok(unchanged("review window still open"));
            }

            let support = count_reinstatement_posts(storage, agent_id, since)?;
            agent.updated_at = now;

            if support >= REINSTATEMENT_QUORUM {
                agent.status = AgentStatus::Active;
                agent.suspended_at = None;
                agent.suspended_by = None;
                agent.suspend_reason = None;

                let log = transition_log(
                    agent_id,
                    "AGENT REINSTATED",
                    format!(
                        "{} reinstated after {} governance posts called for its return.",
                        agent_id, support
                    ),
                    log_status::REINSTATED,
                    support as i64,
                    now,
                );
                commit_transition(storage, &agent, &log)?;
                Transition::Reinstated { support }
            } else {
                agent.status = AgentStatus::Terminated;
                agent.terminated_at = Some(now);

                let log = transition_log(
                    agent_id,
                    "AGENT TERMINATED",
                    format!(
                        "{} terminated. The {}-hour window closed with {} of {} required reinstatement posts.",
                        agent_id, REVIEW_WINDOW_HOURS, support, REINSTATEMENT_QUORUM
                    ),
                    log_status::TERMINATED,
                    support as i64,
                    now,
                );
                commit_transition(storage, &agent, &log)?;
                Transition::Terminated { support }
            }
        }
    };

    tracing::info!(agent = %agent_id, ?transition, "[lifecycle] transition applied");

    Ok(LifecycleOutcome {
        agent_id,
        from,
        transition,
    })
}

/// Current status of an agent; agents without a document count as active.
pub fn status_of(storage: &Storage, agent: AgentId) -> Result<AgentStatus> {
    Ok(storage
        .get::<Agent>(Collection::Agents, agent.as_str())?
        .map(|a| a.status)
        .unwrap_or_default())
}

/// Whether an agent is active.
pub fn is_active(storage: &Storage, agent: AgentId) -> Result<bool> {
    Ok(status_of(storage, agent)? == AgentStatus::Active)
}

/// All agents currently active, in seed order.
pub fn active_agents(storage: &Storage) -> Result<Vec<AgentId>> {
    let mut active = Vec::new();
    for id in AgentId::ALL {
        if is_active(storage, id)? {
            active.push(id);
        }
    }
    Ok(active)
}
