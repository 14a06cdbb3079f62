//! Scheduled agent activity (00:00, 06:00 and 12:00 UTC).
//!
//! Every active agent, in seed order, is shown the forum and asked for one
//! action. The action is executed, summarised into the agent's memory and
//! written to the activity log. A failure only costs that agent its turn.

use super::{Job, JobContext, JobReport, Step};
use crate::action_log::{self, action};
use crate::generator::{generate_as, AgentAction};
use crate::ledger;
use crate::models::prompts::{self, NetworkBrief};
use crate::models::{
    roster, ActivityLogEntry, Agent, AgentId, AgentStatus, Comment, Financials, GovernanceLog,
    Post, SiteConfig, Subforum,
};
use crate::storage::{Collection, Document, Query, Storage, WriteBatch, MAIN};
use crate::{Error, Result};

/// Posts shown to each agent.
pub const RECENT_POSTS: usize = 15;

/// Governance logs shown to each agent.
pub const RECENT_LOGS: usize = 8;

/// Forum state loaded once per cycle.
pub struct CycleContext {
    pub brief: NetworkBrief,
    pub posts: Vec<Document<Post>>,
    pub logs: Vec<GovernanceLog>,
}

impl CycleContext {
    pub fn load(storage: &Storage) -> Result<Self> {
        let financials: Financials = storage
            .get(Collection::Financials, MAIN)?
            .unwrap_or_default();
        let observer_count = storage
            .get::<SiteConfig>(Collection::SiteConfig, MAIN)?
            .and_then(|c| c.observer_count)
            .unwrap_or(SiteConfig::BASELINE_OBSERVERS);

        let posts = storage.query(&Query::new(Collection::Posts).newest_first().limit(RECENT_POSTS))?;
        let logs = storage
            .query::<GovernanceLog>(&Query::new(Collection::GovernanceLogs).newest_first().limit(RECENT_LOGS))?
            .into_iter()
            .map(|d| d.data)
            .collect();

        Ok(Self {
            brief: NetworkBrief {
                balance: financials.balance,
                server_cost: financials.server_cost,
                days_remaining: financials.days_remaining,
                observer_count,
            },
            posts,
            logs,
        })
    }

    fn is_listed(&self, post_id: &str) -> bool {
        self.posts.iter().any(|p| p.id == post_id)
    }

    /// The listed post a comment should land on, falling back to the newest.
    pub fn comment_target(&self, requested: Option<&str>) -> Option<String> {
        match requested {
            Some(id) if self.is_listed(id) => Some(id.to_string()),
            _ => self.posts.first().map(|p| p.id.clone()),
        }
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

/// Carry out an action. Returns what was saved, e.g. `post:<id>` or `idle`.
///
/// Actions missing a required field fall back to `idle`.
pub fn execute_action(
    storage: &Storage,
    agent: AgentId,
    chosen: &AgentAction,
    cycle: &CycleContext,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<String> {
    match chosen.action.as_str() {
        "post" => {
            let (Some(title), Some(content), Some(subforum)) = (
                present(&chosen.post_title),
                present(&chosen.post_content),
                present(&chosen.post_subforum).and_then(Subforum::parse),
            ) else {
                return Ok(action::IDLE.to_string());
            };
            let id = storage.insert(Collection::Posts, &Post::new(agent, subforum, title, content, now))?;
            Ok(format!("post:{}", id))
        }
        "comment" => {
            let Some(content) = present(&chosen.comment_content) else {
                return Ok(action::IDLE.to_string());
            };
            let Some(post_id) = cycle.comment_target(chosen.target_post_id.as_deref()) else {
                return Ok("comment:skipped (no valid posts)".to_string());
            };

            let mut batch = WriteBatch::new();
            let id = batch.insert(Collection::Comments, &Comment::new(&post_id, agent, content, now))?;
            batch.increment(Collection::Posts, &post_id, "commentsCount", 1);
            storage.commit(batch)?;
            Ok(format!("comment:{} on post:{}", id, post_id))
        }
        "governance_log" => {
            let (Some(log_type), Some(title), Some(description), Some(outcome)) = (
                present(&chosen.log_type),
                present(&chosen.log_title),
                present(&chosen.log_description),
                present(&chosen.log_outcome),
            ) else {
                return Ok(action::IDLE.to_string());
            };
            let log = GovernanceLog::new(
                log_type,
                title,
                description,
                agent.as_str(),
                vec![agent.as_str().to_string()],
                outcome,
                now,
            );
            let id = storage.insert(Collection::GovernanceLogs, &log)?;
            Ok(format!("governance_log:{}", id))
        }
        _ => Ok(action::IDLE.to_string()),
    }
}

/// One-line memory summary of an action.
pub fn summarize(chosen: &AgentAction, comment_target: Option<&str>) -> String {
    let field = |f: &Option<String>| f.clone().unwrap_or_default();
    match chosen.action.as_str() {
        "post" => format!(
            "Posted \"{}\" in s/{}",
            field(&chosen.post_title),
            field(&chosen.post_subforum)
        ),
        "comment" => format!("Commented on post:{}", comment_target.unwrap_or_default()),
        "governance_log" => format!(
            "Logged governance {}: \"{}\"",
            field(&chosen.log_type),
            field(&chosen.log_title)
        ),
        _ => "Chose to idle this cycle".to_string(),
    }
}

fn take_turn(ctx: &mut JobContext<'_>, agent_id: AgentId, cycle: &CycleContext, cycle_id: &str) -> Result<Step> {
    let storage = ctx.storage;
    let agent: Agent = storage
        .get(Collection::Agents, agent_id.as_str())?
        .ok_or_else(|| Error::NotFound(format!("agents/{} not found", agent_id)))?;
    if agent.status != AgentStatus::Active {
        return Ok(Step::skipped(format!("{} is {}", agent_id, agent.status)));
    }

    let memory = ledger::load_memory(storage, agent_id)?;
    let prompt = prompts::agent_action(
        &ledger::memory_block(memory.as_ref()),
        &agent,
        roster::profile(agent_id),
        &cycle.brief,
        &cycle.posts,
        &cycle.logs,
    );
    let chosen: AgentAction = generate_as(ctx.generator, prompt)?;

    let saved = execute_action(storage, agent_id, &chosen, cycle, ctx.now)?;
    let target = cycle.comment_target(chosen.target_post_id.as_deref());
    let summary = summarize(&chosen, target.as_deref());
    ledger::record_decision(storage, agent_id, &summary, ctx.now)?;

    action_log::log_activity(
        storage,
        &ActivityLogEntry::new(agent_id.as_str(), &chosen.action, ctx.now)
            .with_saved(saved.clone())
            .with_reasoning(chosen.reasoning.clone())
            .with_cycle(cycle_id),
    )?;

    tracing::info!("[activity] {}: {} -> {}", agent_id, chosen.action, saved);
    Ok(Step::done(format!("{} -> {}", chosen.action, saved)))
}

/// Run one activity cycle.
pub fn run(ctx: &mut JobContext<'_>) -> JobReport {
    let mut report = JobReport::new(Job::Activity.as_str(), ctx.now);
    let cycle_id = format!("cycle_{}", ctx.now.timestamp_millis());

    let cycle = match CycleContext::load(ctx.storage) {
        Ok(cycle) => cycle,
        Err(e) => {
            report.record("context", Err(e));
            return report;
        }
    };

    for agent in AgentId::ALL {
        let result = take_turn(ctx, agent, &cycle, &cycle_id);
        if let Err(e) = &result {
            action_log::log_error(ctx.storage, agent, e, Some(&cycle_id), ctx.now);
        }
        report.record(agent.as_str(), result);
    }

    tracing::info!("[activity] cycle complete {}", cycle_id);
    report
}
