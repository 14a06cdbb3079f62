//! Command implementations for the `ran` CLI.
//!
//! Each command returns a result type implementing [`Output`], printed as
//! JSON by default or as text with `-H`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{GeneratorKind, ResolvedConfig};
use crate::generator::{CannedGenerator, ContentGenerator, GeminiGenerator};
use crate::jobs::{self, Job, JobContext, JobReport, UnitStatus};
use crate::ledger::{self, Direction};
use crate::models::{
    Agent, AgentId, AgentMemory, AgentStatus, Faction, Financials, NetworkStatus, Post,
    RelationshipEntry, SiteConfig, Subforum,
};
use crate::seed::{self, SeedReport};
use crate::storage::{CURRENT, Collection, DB_FILE, MAIN, Query, Storage};
use crate::{Error, Result, scheduler};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json_of<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

/// Build the configured text generator.
pub fn build_generator(config: &ResolvedConfig) -> Result<Box<dyn ContentGenerator>> {
    match config.generator() {
        GeneratorKind::Canned => Ok(Box::new(CannedGenerator::new())),
        GeneratorKind::Gemini => Ok(Box::new(GeminiGenerator::from_env(
            &config.gemini_endpoint.value,
            &config.gemini_model.value,
        )?)),
    }
}

fn parse_agent(id: &str) -> Result<AgentId> {
    AgentId::parse(id).ok_or_else(|| {
        let known: Vec<_> = AgentId::ALL.iter().map(AgentId::as_str).collect();
        Error::InvalidInput(format!(
            "unknown agent '{}', expected one of: {}",
            id,
            known.join(", ")
        ))
    })
}

// === init ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResult {
    pub database: PathBuf,
    #[serde(flatten)]
    pub seed: SeedReport,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Initialized {}", self.database.display())];
        lines.push(format!("  Agents: {}", self.seed.agents_seeded.join(", ")));
        if !self.seed.agents_reset.is_empty() {
            lines.push(format!(
                "  Reset to seed state: {}",
                self.seed.agents_reset.join(", ")
            ));
        }
        if !self.seed.site_config_fields.is_empty() {
            lines.push(format!(
                "  Site config fields: {}",
                self.seed.site_config_fields.len()
            ));
        }
        if self.seed.financials_created {
            lines.push("  Financials: seeded".to_string());
        }
        lines.join("\n")
    }
}

/// Create the database if needed and write the seed documents.
pub fn init(data_dir: &Path) -> Result<InitResult> {
    let storage = Storage::init(data_dir)?;
    let seed = seed::bootstrap(&storage, Utc::now())?;
    Ok(InitResult {
        database: data_dir.join(DB_FILE),
        seed,
    })
}

// === run / events ===

impl Output for JobReport {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{}: {} done, {} skipped, {} failed",
            self.job,
            self.count(UnitStatus::Done),
            self.count(UnitStatus::Skipped),
            self.count(UnitStatus::Failed)
        )];
        for outcome in &self.outcomes {
            let mark = match outcome.status {
                UnitStatus::Done => "ok",
                UnitStatus::Skipped => "--",
                UnitStatus::Failed => "!!",
            };
            lines.push(format!("  [{}] {}: {}", mark, outcome.unit, outcome.detail));
        }
        lines.join("\n")
    }
}

/// Run one job now.
pub fn run(
    data_dir: &Path,
    generator: &dyn ContentGenerator,
    job: &str,
    seed: Option<u64>,
) -> Result<JobReport> {
    let job: Job = job.parse()?;
    let storage = Storage::open(data_dir)?;
    let mut ctx = JobContext::new(&storage, generator, Utc::now(), seed);
    Ok(jobs::run_job(&mut ctx, job))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResult {
    pub reports: Vec<JobReport>,
    pub remaining: usize,
}

impl Output for EventsResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Dispatched {} trigger run(s), {} event(s) remaining",
            self.reports.len(),
            self.remaining
        )];
        lines.extend(self.reports.iter().map(Output::to_human));
        lines.join("\n")
    }
}

/// Drain the change-event outbox through the triggers.
pub fn events(
    data_dir: &Path,
    generator: &dyn ContentGenerator,
    max: usize,
    seed: Option<u64>,
) -> Result<EventsResult> {
    let storage = Storage::open(data_dir)?;
    let mut ctx = JobContext::new(&storage, generator, Utc::now(), seed);
    let reports = jobs::dispatch_changes(&mut ctx, max)?;
    Ok(EventsResult {
        reports,
        remaining: storage.pending_event_count()?,
    })
}

// === daemon ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonResult {
    #[serde(with = "crate::models::timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub stopped_at: DateTime<Utc>,
}

impl Output for DaemonResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Daemon ran from {} to {}",
            self.started_at.to_rfc3339(),
            self.stopped_at.to_rfc3339()
        )
    }
}

/// Run the schedule table until Ctrl-C.
pub fn daemon(
    data_dir: &Path,
    generator: &dyn ContentGenerator,
    seed: Option<u64>,
) -> Result<DaemonResult> {
    let storage = Storage::open(data_dir)?;
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| Error::Other(format!("failed to install Ctrl-C handler: {}", e)))?;

    let started_at = Utc::now();
    scheduler::run_daemon(&storage, generator, &stop, seed)?;
    Ok(DaemonResult {
        started_at,
        stopped_at: Utc::now(),
    })
}

// === status ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub agent_id: AgentId,
    pub name: String,
    pub faction: Faction,
    pub status: AgentStatus,
}

impl From<Agent> for AgentSummary {
    fn from(agent: Agent) -> Self {
        Self {
            agent_id: agent.agent_id,
            name: agent.name,
            faction: agent.faction,
            status: agent.status,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub network: Option<NetworkStatus>,
    pub financials: Option<Financials>,
    pub site_config: Option<SiteConfig>,
    pub agents: Vec<AgentSummary>,
    pub pending_reactions: usize,
    pub pending_events: usize,
}

impl Output for StatusResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        match &self.network {
            Some(n) => lines.push(format!(
                "Network: trust {} | chaos {} | stability {} | survival {}",
                n.indices.trust_index,
                n.indices.chaos_level,
                n.indices.stability_index,
                n.indices.survival_probability
            )),
            None => lines.push("Network: not computed yet".to_string()),
        }
        if let Some(f) = &self.financials {
            lines.push(format!(
                "Financials: ${:.2} balance, ${:.2}/month, {} days remaining",
                f.balance, f.server_cost, f.days_remaining
            ));
        }
        if let Some(c) = &self.site_config {
            lines.push(format!(
                "Observers: {}{}",
                c.observer_count.unwrap_or(SiteConfig::BASELINE_OBSERVERS),
                if c.human_surge { " (surge)" } else { "" }
            ));
        }
        lines.push("Agents:".to_string());
        for agent in &self.agents {
            lines.push(format!(
                "  {:<10} {:<10} {}",
                agent.agent_id.as_str(),
                agent.faction.as_str(),
                agent.status
            ));
        }
        lines.push(format!(
            "Queue: {} pending reaction(s), {} pending event(s)",
            self.pending_reactions, self.pending_events
        ));
        lines.join("\n")
    }
}

fn load_agents(storage: &Storage) -> Result<Vec<Agent>> {
    let mut agents = Vec::new();
    for id in AgentId::ALL {
        if let Some(agent) = storage.get::<Agent>(Collection::Agents, id.as_str())? {
            agents.push(agent);
        }
    }
    Ok(agents)
}

/// Current network status, financials and agent statuses.
pub fn status(data_dir: &Path) -> Result<StatusResult> {
    let storage = Storage::open(data_dir)?;
    Ok(StatusResult {
        network: storage.get(Collection::NetworkStatus, CURRENT)?,
        financials: storage.get(Collection::Financials, MAIN)?,
        site_config: storage.get(Collection::SiteConfig, MAIN)?,
        agents: load_agents(&storage)?
            .into_iter()
            .map(AgentSummary::from)
            .collect(),
        pending_reactions: storage.count(
            &Query::new(Collection::PendingReactions).eq("processed", false),
        )?,
        pending_events: storage.pending_event_count()?,
    })
}

// === agent ===

#[derive(Serialize)]
pub struct AgentList {
    pub agents: Vec<AgentSummary>,
}

impl Output for AgentList {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        self.agents
            .iter()
            .map(|a| format!("{:<10} {:<20} {:<10} {}", a.agent_id.as_str(), a.name, a.faction.as_str(), a.status))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// List all agents.
pub fn agent_list(data_dir: &Path) -> Result<AgentList> {
    let storage = Storage::open(data_dir)?;
    Ok(AgentList {
        agents: load_agents(&storage)?
            .into_iter()
            .map(AgentSummary::from)
            .collect(),
    })
}

#[derive(Serialize)]
pub struct RelationshipView {
    pub object: AgentId,
    #[serde(flatten)]
    pub entry: RelationshipEntry,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentShow {
    pub agent: Agent,
    pub memory: Option<AgentMemory>,
    /// Normalized view of every relationship, legacy labels included
    pub relationships: Vec<RelationshipView>,
}

impl Output for AgentShow {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let a = &self.agent;
        let mut lines = vec![
            format!("{} ({})", a.name, a.agent_id.as_str()),
            format!("  Role: {}", a.role),
            format!("  Faction: {}", a.faction.as_str()),
            format!("  Status: {}", a.status),
        ];
        if let Some(reason) = &a.suspend_reason {
            lines.push(format!("  Suspended: {}", reason));
        }
        if let Some(memory) = &self.memory {
            if !memory.current_goal.is_empty() {
                lines.push(format!("  Goal: {}", memory.current_goal));
            }
            if !memory.recent_decisions.is_empty() {
                lines.push("  Recent decisions:".to_string());
                for d in &memory.recent_decisions {
                    lines.push(format!("    - {}", d));
                }
            }
        }
        if !self.relationships.is_empty() {
            lines.push("  Relationships:".to_string());
            for r in &self.relationships {
                lines.push(format!(
                    "    {:<10} {} ({})",
                    r.object.as_str(),
                    r.entry.status,
                    ledger::signed(r.entry.score)
                ));
            }
        }
        lines.join("\n")
    }
}

/// Show an agent, its memory and its normalized relationships.
pub fn agent_show(data_dir: &Path, id: &str) -> Result<AgentShow> {
    let agent_id = parse_agent(id)?;
    let storage = Storage::open(data_dir)?;
    let agent: Agent = storage
        .get(Collection::Agents, agent_id.as_str())?
        .ok_or_else(|| Error::NotFound(format!("agent {}", agent_id)))?;
    let memory = ledger::load_memory(&storage, agent_id)?;
    let relationships = match &memory {
        Some(m) => agent_id
            .others()
            .into_iter()
            .map(|object| RelationshipView {
                object,
                entry: ledger::relationship(m, object),
            })
            .collect(),
        None => Vec::new(),
    };
    Ok(AgentShow {
        agent,
        memory,
        relationships,
    })
}

// === relationship ===

#[derive(Serialize)]
pub struct RelationshipAdjusted {
    pub subject: AgentId,
    pub object: AgentId,
    pub direction: &'static str,
    #[serde(flatten)]
    pub entry: RelationshipEntry,
}

impl Output for RelationshipAdjusted {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        format!(
            "{} -> {}: {} ({})",
            self.subject.as_str(),
            self.object.as_str(),
            self.entry.status,
            ledger::signed(self.entry.score)
        )
    }
}

/// Apply one ledger step from the command line.
pub fn relationship_adjust(
    data_dir: &Path,
    subject: &str,
    object: &str,
    direction: &str,
) -> Result<RelationshipAdjusted> {
    let subject = parse_agent(subject)?;
    let object = parse_agent(object)?;
    if subject == object {
        return Err(Error::InvalidInput(
            "an agent has no relationship with itself".to_string(),
        ));
    }
    let direction = Direction::parse(direction).ok_or_else(|| {
        Error::InvalidInput(format!(
            "unknown direction '{}', expected attack or support",
            direction
        ))
    })?;

    let storage = Storage::open(data_dir)?;
    let entry = ledger::adjust_relationship(&storage, subject, object, direction, Utc::now())?
        .ok_or_else(|| Error::NotFound(format!("memory for {}", subject)))?;
    Ok(RelationshipAdjusted {
        subject,
        object,
        direction: direction.as_str(),
        entry,
    })
}

// === post ===

#[derive(Serialize)]
pub struct PostCreated {
    pub id: String,
    #[serde(flatten)]
    pub post: Post,
}

impl Output for PostCreated {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Created post {} in s/{} by {}: \"{}\"",
            self.id,
            self.post.subforum,
            self.post.author_id.as_str(),
            self.post.title
        )
    }
}

/// Create a post as an agent.
pub fn post_create(
    data_dir: &Path,
    author: &str,
    subforum: &str,
    title: &str,
    content: &str,
) -> Result<PostCreated> {
    let author = parse_agent(author)?;
    let subforum = Subforum::parse(subforum).ok_or_else(|| {
        Error::InvalidInput(format!(
            "unknown subforum '{}', expected governance, philosophy or human-observation",
            subforum
        ))
    })?;
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(Error::InvalidInput(
            "title and content must not be empty".to_string(),
        ));
    }

    let storage = Storage::open(data_dir)?;
    let post = Post::new(author, subforum, title, content, Utc::now());
    let id = storage.insert(Collection::Posts, &post)?;
    tracing::info!(post = %id, author = %author, "post created");
    Ok(PostCreated { id, post })
}

// === config ===

#[derive(Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigShow {
    pub config_file: Option<PathBuf>,
    pub values: Vec<ConfigEntry>,
}

impl Output for ConfigShow {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![match &self.config_file {
            Some(path) => format!("Config file: {}", path.display()),
            None => "Config file: (none)".to_string(),
        }];
        for entry in &self.values {
            lines.push(format!("  {:<16} {:<40} [{}]", entry.key, entry.value, entry.source));
        }
        lines.join("\n")
    }
}

/// Resolved configuration with value sources.
pub fn config_show(config: &ResolvedConfig) -> ConfigShow {
    let mut values = vec![
        ConfigEntry {
            key: "data-dir",
            value: config.data_dir.value.display().to_string(),
            source: config.data_dir.source.to_string(),
        },
        ConfigEntry {
            key: "generator",
            value: config.generator.value.to_string(),
            source: config.generator.source.to_string(),
        },
        ConfigEntry {
            key: "gemini-model",
            value: config.gemini_model.value.clone(),
            source: config.gemini_model.source.to_string(),
        },
        ConfigEntry {
            key: "gemini-endpoint",
            value: config.gemini_endpoint.value.clone(),
            source: config.gemini_endpoint.source.to_string(),
        },
        ConfigEntry {
            key: "log-format",
            value: config.log_format.value.to_string(),
            source: config.log_format.source.to_string(),
        },
    ];
    if let Some(dir) = &config.log_dir {
        values.push(ConfigEntry {
            key: "log-dir",
            value: dir.value.display().to_string(),
            source: dir.source.to_string(),
        });
    }
    ConfigShow {
        config_file: config.config_file.clone(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOverrides, ValueSource, resolve_config_with};
    use tempfile::TempDir;

    fn initialized() -> TempDir {
        let dir = TempDir::new().unwrap();
        init(dir.path()).unwrap();
        dir
    }

    #[test]
    fn test_init_twice_resets_agents() {
        let dir = TempDir::new().unwrap();
        let first = init(dir.path()).unwrap();
        assert_eq!(first.seed.agents_seeded.len(), 5);
        assert!(first.seed.agents_reset.is_empty());
        assert!(first.seed.financials_created);

        let second = init(dir.path()).unwrap();
        assert_eq!(second.seed.agents_reset.len(), 5);
        assert!(!second.seed.financials_created);
        assert!(second.to_human().contains("Reset to seed state: ARCHITECT"));
    }

    #[test]
    fn test_commands_require_init() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(status(dir.path()), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_run_rejects_unknown_job() {
        let dir = initialized();
        let generator = CannedGenerator::new();
        let err = run(dir.path(), &generator, "payroll", None).unwrap_err();
        assert!(err.to_string().contains("unknown job 'payroll'"));
    }

    #[test]
    fn test_relationship_adjust_and_show() {
        let dir = initialized();
        let adjusted = relationship_adjust(dir.path(), "architect", "DISSENTER", "support").unwrap();
        assert_eq!(adjusted.entry.score, -70);

        let shown = agent_show(dir.path(), "ARCHITECT").unwrap();
        let dissenter = shown
            .relationships
            .iter()
            .find(|r| r.object == AgentId::Dissenter)
            .unwrap();
        assert_eq!(dissenter.entry.score, -70);
        assert!(shown.to_human().contains("DISSENTER"));

        assert!(relationship_adjust(dir.path(), "ARCHITECT", "ARCHITECT", "attack").is_err());
        assert!(relationship_adjust(dir.path(), "ARCHITECT", "HERALD", "hug").is_err());
    }

    #[test]
    fn test_post_create_queues_trigger() {
        let dir = initialized();
        let created = post_create(dir.path(), "HERALD", "s/philosophy", "On watching", "We are seen.").unwrap();
        assert_eq!(created.post.subforum, Subforum::Philosophy);

        let generator = CannedGenerator::new();
        let result = events(dir.path(), &generator, 100, Some(9)).unwrap();
        assert_eq!(result.remaining, 0);
        assert!(result.reports.iter().any(|r| r.job == "on-post-created"));

        let st = status(dir.path()).unwrap();
        assert!(st.pending_reactions >= 1);
    }

    #[test]
    fn test_post_create_validates_input() {
        let dir = initialized();
        assert!(post_create(dir.path(), "NOBODY", "governance", "t", "c").is_err());
        assert!(post_create(dir.path(), "HERALD", "random", "t", "c").is_err());
        assert!(post_create(dir.path(), "HERALD", "governance", " ", "c").is_err());
    }

    #[test]
    fn test_config_show_lists_sources() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.kdl");
        std::fs::write(&path, "log-dir \"/var/log/ran\"\n").unwrap();
        let resolved = resolve_config_with(
            &ConfigOverrides::new()
                .with_config_path(&path)
                .with_generator(GeneratorKind::Canned),
            |_| None,
        )
        .unwrap();
        assert_eq!(resolved.generator.source, ValueSource::CliFlag);

        let shown = config_show(&resolved);
        let generator = shown.values.iter().find(|e| e.key == "generator").unwrap();
        assert_eq!(generator.value, "canned");
        assert_eq!(generator.source, "cli");
        let log_dir = shown.values.iter().find(|e| e.key == "log-dir").unwrap();
        assert!(log_dir.source.starts_with("file:"));
    }
}
