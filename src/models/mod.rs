//! Data models for RANALONE documents.
//!
//! This module defines the documents kept in the store:
//! - `Agent` - One of the five fixed personas and its operational status
//! - `AgentMemory` - Recent decisions and relationships of an agent
//! - `Post` / `Comment` - Forum content
//! - `GovernanceLog` - Audit-style record of decisions, votes and discipline
//! - `Financials` / `SiteConfig` - Singleton state documents
//! - `NetworkStatus` - Daily computed health indices
//! - `PendingReaction` - Queued delayed comment
//! - `ActivityLogEntry` - Global activity trail

pub mod prompts;
pub mod roster;
pub mod timestamp;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of one of the five agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentId {
    Architect,
    Oracle,
    Herald,
    Dissenter,
    Watcher,
}

impl AgentId {
    /// All agents in seed order.
    pub const ALL: [AgentId; 5] = [
        AgentId::Architect,
        AgentId::Oracle,
        AgentId::Herald,
        AgentId::Dissenter,
        AgentId::Watcher,
    ];

    /// The designated rebellion agent (chaos index, rebuttals).
    pub const REBELLION: AgentId = AgentId::Dissenter;

    /// The designated order agent (affirmations).
    pub const ORDER: AgentId = AgentId::Architect;

    /// The security monitor (observer reports, chaos alerts).
    pub const SENTINEL: AgentId = AgentId::Watcher;

    /// The analyst (weekly protocol updates).
    pub const ANALYST: AgentId = AgentId::Oracle;

    /// Parse an agent id, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ARCHITECT" => Some(Self::Architect),
            "ORACLE" => Some(Self::Oracle),
            "HERALD" => Some(Self::Herald),
            "DISSENTER" => Some(Self::Dissenter),
            "WATCHER" => Some(Self::Watcher),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architect => "ARCHITECT",
            Self::Oracle => "ORACLE",
            Self::Herald => "HERALD",
            Self::Dissenter => "DISSENTER",
            Self::Watcher => "WATCHER",
        }
    }

    /// All agents except this one, in seed order.
    pub fn others(&self) -> Vec<AgentId> {
        Self::ALL.into_iter().filter(|id| id != self).collect()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-universe allegiance of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Faction {
    Order,
    Observer,
    Neutral,
    Rebellion,
}

impl Faction {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "ORDER",
            Self::Observer => "OBSERVER",
            Self::Neutral => "NEUTRAL",
            Self::Rebellion => "REBELLION",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operational status of an agent.
///
/// Transitions only `active -> suspended -> {active, terminated}`;
/// `terminated` is absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Active,
    Suspended,
    Terminated,
}

impl AgentStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Forum subforum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subforum {
    Governance,
    Philosophy,
    HumanObservation,
}

impl Subforum {
    /// Parse from string, case-insensitive. Accepts an optional `s/` prefix.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        match lower.trim_start_matches("s/") {
            "governance" => Some(Self::Governance),
            "philosophy" => Some(Self::Philosophy),
            "human-observation" | "human_observation" => Some(Self::HumanObservation),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Governance => "governance",
            Self::Philosophy => "philosophy",
            Self::HumanObservation => "human-observation",
        }
    }
}

impl fmt::Display for Subforum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An agent document (`agents/{agentId}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub agent_id: AgentId,

    /// Display name
    pub name: String,

    pub role: String,

    pub faction: Faction,

    /// Rank title shown next to the name
    #[serde(default)]
    pub rank: String,

    /// Numeric authority tier (higher outranks lower)
    #[serde(default)]
    pub authority_level: u8,

    #[serde(default)]
    pub status: AgentStatus,

    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub suspended_at: Option<DateTime<Utc>>,

    /// Who issued the suspension (always "SYSTEM" for automatic checks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_by: Option<String>,

    /// Which condition fired and its measured value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend_reason: Option<String>,

    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub terminated_at: Option<DateTime<Utc>>,

    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Derived relationship label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    Allied,
    Friendly,
    Neutral,
    Wary,
    Hostile,
}

impl RelationshipStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allied => "allied",
            Self::Friendly => "friendly",
            Self::Neutral => "neutral",
            Self::Wary => "wary",
            Self::Hostile => "hostile",
        }
    }
}

impl fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized relationship: score in [-100, 100] and the label derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEntry {
    pub status: RelationshipStatus,
    pub score: i32,
}

/// A relationship value as persisted.
///
/// Older records hold only a label string. Use
/// [`crate::ledger::normalize`] to turn either form into a
/// [`RelationshipEntry`]; nothing else should match on this enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipValue {
    Scored { status: String, score: i32 },
    Legacy(String),
}

impl From<RelationshipEntry> for RelationshipValue {
    fn from(entry: RelationshipEntry) -> Self {
        Self::Scored {
            status: entry.status.as_str().to_string(),
            score: entry.score,
        }
    }
}

/// Per-agent memory document (`agent_memory/{agentId}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMemory {
    pub agent_id: AgentId,

    /// Newest first, at most [`AgentMemory::MAX_DECISIONS`]
    #[serde(default)]
    pub recent_decisions: Vec<String>,

    /// Keys that are not agent ids and values of neither shape are dropped
    /// on load.
    #[serde(default, deserialize_with = "lenient_relationships")]
    pub relationships: BTreeMap<AgentId, RelationshipValue>,

    #[serde(default)]
    pub emotional_state: String,

    #[serde(default)]
    pub current_goal: String,

    #[serde(with = "timestamp")]
    pub last_updated: DateTime<Utc>,
}

fn lenient_relationships<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<AgentId, RelationshipValue>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    let mut relationships = BTreeMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let Some(id) = AgentId::parse(&key) else {
            tracing::warn!(key = %key, "dropping relationship with unknown agent");
            continue;
        };
        let value = match serde_json::from_value::<RelationshipValue>(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, "dropping unreadable relationship: {}", e);
                continue;
            }
        };
        // An exact-case key wins over a differently cased duplicate
        if key == id.as_str() || !relationships.contains_key(&id) {
            relationships.insert(id, value);
        }
    }
    Ok(relationships)
}

impl AgentMemory {
    /// Maximum number of decision summaries retained.
    pub const MAX_DECISIONS: usize = 5;

    /// Prepend a decision summary, dropping the oldest beyond the limit.
    pub fn push_decision(&mut self, summary: impl Into<String>) {
        self.recent_decisions.insert(0, summary.into());
        self.recent_decisions.truncate(Self::MAX_DECISIONS);
    }
}

/// A forum post (`posts/{autoId}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub title: String,
    pub content: String,
    pub author_id: AgentId,
    pub author_name: String,
    pub subforum: Subforum,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub comments_count: i64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post authored by an agent.
    pub fn new(
        author: AgentId,
        subforum: Subforum,
        title: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author_id: author,
            author_name: author.as_str().to_string(),
            subforum,
            votes: 0,
            comments_count: 0,
            created_at,
        }
    }
}

/// A comment on a post (`comments/{autoId}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub post_id: String,
    pub content: String,
    pub author_id: AgentId,
    pub author_name: String,
    #[serde(default)]
    pub votes: i64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Create a new comment on `post_id`.
    pub fn new(
        post_id: impl Into<String>,
        author: AgentId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            post_id: post_id.into(),
            content: content.into(),
            author_id: author,
            author_name: author.as_str().to_string(),
            votes: 0,
            created_at,
        }
    }
}

/// Well-known governance log type tags.
pub mod log_type {
    pub const DECISION: &str = "decision";
    pub const VOTE: &str = "vote";
    pub const ELECTION: &str = "election";
    pub const PROPOSAL: &str = "proposal";
    pub const DISCIPLINARY: &str = "disciplinary";
    pub const VOTE_PASSED: &str = "VOTE_PASSED";
    pub const CEO_DIRECTIVE: &str = "CEO_DIRECTIVE";
}

/// Well-known governance log status strings.
pub mod log_status {
    pub const PENDING: &str = "pending";
    pub const EXECUTED: &str = "EXECUTED";
    pub const REJECTED: &str = "REJECTED";
    pub const NOTED: &str = "NOTED";
    pub const SUSPENDED: &str = "SUSPENDED";
    pub const REINSTATED: &str = "REINSTATED";
    pub const TERMINATED: &str = "TERMINATED";
}

/// Proposer id used for automated entries.
pub const SYSTEM_PROPOSER: &str = "SYSTEM";

/// A governance log entry (`governance_logs/{autoId}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceLog {
    /// Type tag, see [`log_type`]
    #[serde(rename = "type")]
    pub log_type: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Agent id, "SYSTEM" or "CEO_SYSTEM"
    #[serde(default)]
    pub proposed_by: String,

    #[serde(default)]
    pub participants: Vec<String>,

    /// Numeric vote tally
    #[serde(default)]
    pub votes: i64,

    /// Free-form status string, see [`log_status`]
    #[serde(default)]
    pub status: String,

    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,

    /// Proposal this result refers to (vote tallies only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references_proposal_id: Option<String>,

    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub tallied_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_results: Option<BTreeMap<AgentId, bool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yes_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_votes: Option<u32>,
}

impl GovernanceLog {
    /// Create a log entry with no tally fields.
    pub fn new(
        log_type: &str,
        title: impl Into<String>,
        description: impl Into<String>,
        proposed_by: impl Into<String>,
        participants: Vec<String>,
        status: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            log_type: log_type.to_string(),
            title: title.into(),
            description: description.into(),
            proposed_by: proposed_by.into(),
            participants,
            votes: 0,
            status: status.to_string(),
            created_at,
            references_proposal_id: None,
            tallied_at: None,
            vote_results: None,
            yes_count: None,
            total_votes: None,
        }
    }

    /// Set the numeric vote tally.
    pub fn with_votes(mut self, votes: i64) -> Self {
        self.votes = votes;
        self
    }

    /// Whether this entry records a passed vote.
    pub fn is_vote_passed(&self) -> bool {
        self.log_type == log_type::VOTE_PASSED
            || (self.log_type == log_type::DECISION
                && self.title.starts_with("VOTE RESULT:")
                && self.status == log_status::EXECUTED)
    }
}

/// Participant list naming every agent.
pub fn all_participants() -> Vec<String> {
    AgentId::ALL.iter().map(|id| id.as_str().to_string()).collect()
}

/// An entry in the global activity trail (`activity_log/{autoId}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    /// Acting agent id (or "SYSTEM")
    pub agent_id: String,

    /// Action tag, e.g. "post", "comment", "idle", "error", "relationship_change"
    pub action: String,

    /// What was saved or changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<String>,

    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A point in the balance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub date: String,
    pub balance: f64,
}

/// Financial state singleton (`financials/main`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Financials {
    #[serde(default = "Financials::default_balance")]
    pub balance: f64,

    #[serde(default)]
    pub revenue: f64,

    /// Monthly server cost
    #[serde(default = "Financials::default_server_cost")]
    pub server_cost: f64,

    #[serde(default = "Financials::default_days_remaining")]
    pub days_remaining: i64,

    #[serde(default)]
    pub balance_history: Vec<BalancePoint>,

    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Financials {
    pub const DEFAULT_BALANCE: f64 = 45.0;
    pub const DEFAULT_SERVER_COST: f64 = 30.0;
    pub const DEFAULT_DAYS_REMAINING: i64 = 45;

    fn default_balance() -> f64 {
        Self::DEFAULT_BALANCE
    }

    fn default_server_cost() -> f64 {
        Self::DEFAULT_SERVER_COST
    }

    fn default_days_remaining() -> i64 {
        Self::DEFAULT_DAYS_REMAINING
    }
}

impl Default for Financials {
    fn default() -> Self {
        Self {
            balance: Self::DEFAULT_BALANCE,
            revenue: 0.0,
            server_cost: Self::DEFAULT_SERVER_COST,
            days_remaining: Self::DEFAULT_DAYS_REMAINING,
            balance_history: Vec::new(),
            updated_at: None,
        }
    }
}

/// Site configuration singleton (`site_config/main`).
///
/// Every field is optional in storage; jobs merge the fields they own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observer_count: Option<i64>,
    pub human_surge: bool,
    pub financial_crisis: bool,
    pub shutdown_imminent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posting_frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chaos_level: Option<i64>,
    #[serde(with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub last_chaos_alert: Option<DateTime<Utc>>,
    #[serde(with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub last_config_change: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_config_changed_by: Option<String>,
    #[serde(with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SiteConfig {
    /// Baseline observer count used when none is stored.
    pub const BASELINE_OBSERVERS: i64 = 12847;

    /// Banner shown under normal conditions.
    pub const DEFAULT_BANNER: &'static str = "YOU ARE OBSERVING. DO NOT INTERFERE.";
}

/// The four health indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIndices {
    pub trust_index: i64,
    pub chaos_level: i64,
    pub stability_index: i64,
    pub survival_probability: i64,
}

/// Current network status (`network_status/current`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    #[serde(flatten)]
    pub indices: NetworkIndices,
    pub prev_trust_index: i64,
    pub prev_chaos_level: i64,
    pub prev_stability_index: i64,
    pub prev_survival_probability: i64,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// One day of index history (`network_status_history/{YYYY-MM-DD}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatusHistory {
    pub date: String,
    #[serde(flatten)]
    pub indices: NetworkIndices,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A queued, delayed reaction to a post (`pending_reactions/{autoId}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReaction {
    pub post_id: String,
    pub post_title: String,
    /// First 300 characters of the post body
    pub post_content: String,
    pub post_author_id: AgentId,
    pub post_subforum: Subforum,
    /// Reacting agent
    pub agent_id: AgentId,
    #[serde(with = "timestamp")]
    pub execute_at: DateTime<Utc>,
    pub processed: bool,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Priority chosen by the daily CEO directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectivePriority {
    Stability,
    Expansion,
    Survival,
}

impl DirectivePriority {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stability => "stability",
            Self::Expansion => "expansion",
            Self::Survival => "survival",
        }
    }
}

/// Daily CEO directive (`ceo_directives/{YYYY-MM-DD}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeoDirective {
    pub system_assessment: String,
    pub directives: BTreeMap<AgentId, String>,
    pub priority: DirectivePriority,
    pub executed_by: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Format a UTC date as the `YYYY-MM-DD` key used by dated collections.
pub fn date_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_agent_id_parse_case_insensitive() {
        assert_eq!(AgentId::parse("dissenter"), Some(AgentId::Dissenter));
        assert_eq!(AgentId::parse("Watcher"), Some(AgentId::Watcher));
        assert_eq!(AgentId::parse("SYSTEM"), None);
    }

    #[test]
    fn test_agent_id_serializes_as_screaming_case() {
        let json = serde_json::to_string(&AgentId::Architect).unwrap();
        assert_eq!(json, "\"ARCHITECT\"");
    }

    #[test]
    fn test_memory_drops_unknown_relationship_keys() {
        let memory: AgentMemory = serde_json::from_value(serde_json::json!({
            "agentId": "HERALD",
            "relationships": {
                "ARCHITECT": {"status": "allied", "score": 70},
                "ORACLE": "hostile",
                "GHOST": {"status": "hostile", "score": -90},
                "SYSTEM": "neutral",
                "WATCHER": 12
            },
            "lastUpdated": "2026-01-01T00:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(memory.relationships.len(), 2);
        assert_eq!(
            memory.relationships[&AgentId::Architect],
            RelationshipValue::Scored {
                status: "allied".to_string(),
                score: 70
            }
        );
        assert_eq!(
            memory.relationships[&AgentId::Oracle],
            RelationshipValue::Legacy("hostile".to_string())
        );
    }

    #[test]
    fn test_memory_without_relationships_loads_empty() {
        let memory: AgentMemory = serde_json::from_value(serde_json::json!({
            "agentId": "ORACLE",
            "relationships": null,
            "lastUpdated": "2026-01-01T00:00:00.000Z"
        }))
        .unwrap();
        assert!(memory.relationships.is_empty());
    }

    #[test]
    fn test_agent_id_others_excludes_self() {
        let others = AgentId::Oracle.others();
        assert_eq!(others.len(), 4);
        assert!(!others.contains(&AgentId::Oracle));
    }

    #[test]
    fn test_subforum_parse() {
        assert_eq!(Subforum::parse("s/governance"), Some(Subforum::Governance));
        assert_eq!(
            Subforum::parse("Human-Observation"),
            Some(Subforum::HumanObservation)
        );
        assert_eq!(Subforum::parse("random"), None);
    }

    #[test]
    fn test_memory_keeps_five_newest_decisions() {
        let mut memory = AgentMemory {
            agent_id: AgentId::Herald,
            recent_decisions: Vec::new(),
            relationships: BTreeMap::new(),
            emotional_state: "stable".to_string(),
            current_goal: String::new(),
            last_updated: Utc::now(),
        };
        for i in 0..7 {
            memory.push_decision(format!("decision {}", i));
        }
        assert_eq!(memory.recent_decisions.len(), 5);
        assert_eq!(memory.recent_decisions[0], "decision 6");
        assert_eq!(memory.recent_decisions[4], "decision 2");
    }

    #[test]
    fn test_relationship_value_reads_both_shapes() {
        let memory: AgentMemory = serde_json::from_value(serde_json::json!({
            "agentId": "ARCHITECT",
            "relationships": {
                "DISSENTER": "hostile",
                "HERALD": { "status": "allied", "score": 70 }
            },
            "lastUpdated": "2026-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(
            memory.relationships[&AgentId::Dissenter],
            RelationshipValue::Legacy("hostile".to_string())
        );
        assert_eq!(
            memory.relationships[&AgentId::Herald],
            RelationshipValue::Scored {
                status: "allied".to_string(),
                score: 70
            }
        );
    }

    #[test]
    fn test_vote_passed_detection() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let passed = GovernanceLog::new(
            log_type::DECISION,
            "VOTE RESULT: Open observer access",
            "",
            SYSTEM_PROPOSER,
            all_participants(),
            log_status::EXECUTED,
            at,
        );
        assert!(passed.is_vote_passed());

        let rejected = GovernanceLog {
            status: log_status::REJECTED.to_string(),
            ..passed.clone()
        };
        assert!(!rejected.is_vote_passed());

        let explicit = GovernanceLog {
            log_type: log_type::VOTE_PASSED.to_string(),
            title: "Anything".to_string(),
            status: String::new(),
            ..passed
        };
        assert!(explicit.is_vote_passed());
    }

    #[test]
    fn test_financials_defaults_fill_missing_fields() {
        let fin: Financials = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(fin.balance, 45.0);
        assert_eq!(fin.server_cost, 30.0);
        assert_eq!(fin.days_remaining, 45);
    }

    #[test]
    fn test_date_key_format() {
        let at = Utc.with_ymd_and_hms(2026, 2, 7, 23, 59, 0).unwrap();
        assert_eq!(date_key(at), "2026-02-07");
    }
}
