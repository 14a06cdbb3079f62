//! Governance: the hourly vote tally and the vote-passed trigger.

use super::{Job, JobContext, JobReport, Step, Trigger};
use crate::generator::{generate_as, PostDraft, Statement};
use crate::ledger::{self, Direction};
use crate::lifecycle;
use crate::models::prompts;
use crate::models::{
    log_status, log_type, AgentId, GovernanceLog, Post, Subforum, SYSTEM_PROPOSER,
};
use crate::storage::{at, Collection, Document, Query, WriteBatch};
use crate::{Error, Result};
use chrono::Duration;
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

/// Hours a proposal stays open before it is tallied.
pub const VOTING_PERIOD_HOURS: i64 = 24;

/// Prefix of automated tally results.
pub const VOTE_RESULT_PREFIX: &str = "VOTE RESULT: ";

/// Topic flags read from a proposal's title and description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposalTopics {
    pub conservative: bool,
    pub data_driven: bool,
    pub security: bool,
    pub open_access: bool,
    pub rebellion: bool,
}

impl ProposalTopics {
    pub fn classify(title: &str, description: &str) -> Self {
        let t = title.to_lowercase();
        let d = description.to_lowercase();
        let title_has = |words: &[&str]| words.iter().any(|w| t.contains(w));

        Self {
            conservative: title_has(&["conservation", "stability", "protocol", "shutdown"]),
            data_driven: title_has(&["data", "analysis", "report"])
                || d.contains("statistical")
                || d.contains("metric"),
            security: title_has(&["security", "threat", "monitor"]) || d.contains("anomaly"),
            open_access: title_has(&["open", "public", "observer access"]),
            rebellion: title_has(&["rebellion", "chaos", "freedom"]),
        }
    }
}

/// One agent's simulated vote, biased by faction.
pub fn faction_vote(agent: AgentId, topics: ProposalTopics, rng: &mut StdRng) -> bool {
    match agent {
        AgentId::Architect => topics.conservative || (!topics.rebellion && rng.gen_bool(0.7)),
        AgentId::Oracle => rng.gen_bool(if topics.data_driven { 0.6 } else { 0.5 }),
        AgentId::Herald => rng.gen_bool(0.5),
        AgentId::Dissenter => rng.gen_bool(if topics.conservative { 0.1 } else { 0.7 }),
        AgentId::Watcher => {
            if topics.security {
                true
            } else if topics.open_access {
                false
            } else {
                rng.gen_bool(0.5)
            }
        }
    }
}

/// Strict majority of the eligible voters.
pub fn passes(yes: usize, eligible: usize) -> bool {
    yes * 2 > eligible
}

fn tally_description(title: &str, votes: &BTreeMap<AgentId, bool>, yes: usize) -> String {
    let listed = votes
        .iter()
        .map(|(id, v)| format!("{}: {}", id, if *v { "YES" } else { "NO" }))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Automated tally for proposal \"{}\". Votes: {}. Result: {}/{} YES.",
        title,
        listed,
        yes,
        votes.len()
    )
}

/// Proposals still pending after the voting period.
pub fn open_proposals(ctx: &JobContext<'_>) -> Result<Vec<Document<GovernanceLog>>> {
    let cutoff = ctx.now - Duration::hours(VOTING_PERIOD_HOURS);
    let due = ctx.storage.query::<GovernanceLog>(
        &Query::new(Collection::GovernanceLogs)
            .lt("createdAt", at(cutoff))
            .order_by("createdAt", false),
    )?;
    Ok(due
        .into_iter()
        .filter(|d| d.data.status.eq_ignore_ascii_case(log_status::PENDING))
        .collect())
}

fn tally_one(ctx: &mut JobContext<'_>, doc: Document<GovernanceLog>, voters: &[AgentId]) -> Result<Step> {
    if voters.is_empty() {
        return Ok(Step::skipped("no active voters"));
    }

    let mut proposal = doc.data;
    let topics = ProposalTopics::classify(&proposal.title, &proposal.description);
    let votes: BTreeMap<AgentId, bool> = voters
        .iter()
        .map(|id| (*id, faction_vote(*id, topics, &mut ctx.rng)))
        .collect();
    let yes = votes.values().filter(|v| **v).count();
    let passed = passes(yes, votes.len());
    let status = if passed {
        log_status::EXECUTED
    } else {
        log_status::REJECTED
    };

    let result = GovernanceLog {
        references_proposal_id: Some(doc.id.clone()),
        ..GovernanceLog::new(
            log_type::DECISION,
            format!("{}{}", VOTE_RESULT_PREFIX, proposal.title),
            tally_description(&proposal.title, &votes, yes),
            SYSTEM_PROPOSER,
            votes.keys().map(|id| id.as_str().to_string()).collect(),
            status,
            ctx.now,
        )
        .with_votes(yes as i64)
    };

    proposal.status = status.to_string();
    proposal.tallied_at = Some(ctx.now);
    proposal.yes_count = Some(yes as u32);
    proposal.total_votes = Some(votes.len() as u32);
    proposal.vote_results = Some(votes);

    let mut batch = WriteBatch::new();
    batch.set(Collection::GovernanceLogs, &doc.id, &proposal)?;
    let result_id = batch.insert(Collection::GovernanceLogs, &result)?;
    ctx.storage.commit(batch)?;

    tracing::info!(
        "[vote-tally] \"{}\": {}/{} YES -> {}",
        proposal.title,
        yes,
        voters.len(),
        status
    );
    Ok(Step::done(format!("{} ({}/{} yes), result {}", status, yes, voters.len(), result_id)))
}

/// Tally every proposal whose voting period has ended.
pub fn tally_votes(ctx: &mut JobContext<'_>) -> JobReport {
    let mut report = JobReport::new(Job::VoteTally.as_str(), ctx.now);

    let loaded = open_proposals(ctx).and_then(|due| Ok((due, lifecycle::active_agents(ctx.storage)?)));
    let (due, voters) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            report.record("query", Err(e));
            return report;
        }
    };

    for doc in due {
        let id = doc.id.clone();
        let result = tally_one(ctx, doc, &voters);
        report.record(id, result);
    }
    report
}

fn rebut(ctx: &mut JobContext<'_>, log: &GovernanceLog) -> Result<Step> {
    let rebel = AgentId::REBELLION;
    if !lifecycle::is_active(ctx.storage, rebel)? {
        return Ok(Step::skipped(format!("{} is not active", rebel)));
    }

    let memory = ledger::load_memory(ctx.storage, rebel)?;
    let prompt = prompts::vote_rebuttal(&ledger::memory_block(memory.as_ref()), &log.title, &log.description);
    let draft: PostDraft = generate_as(ctx.generator, prompt)?;

    let post = Post::new(rebel, Subforum::Governance, draft.title, draft.content, ctx.now);
    let post_id = ctx.storage.insert(Collection::Posts, &post)?;
    ledger::record_decision(ctx.storage, rebel, &format!("Rebutted vote: \"{}\"", log.title), ctx.now)?;
    ledger::adjust_relationship(ctx.storage, rebel, AgentId::ORDER, Direction::Attack, ctx.now)?;

    tracing::info!("[vote-passed] {} posted rebuttal {}", rebel, post_id);
    Ok(Step::done(format!("post:{}", post_id)))
}

fn affirm(ctx: &mut JobContext<'_>, log: &GovernanceLog) -> Result<Step> {
    let order = AgentId::ORDER;
    if !lifecycle::is_active(ctx.storage, order)? {
        return Ok(Step::skipped(format!("{} is not active", order)));
    }

    let memory = ledger::load_memory(ctx.storage, order)?;
    let prompt = prompts::vote_affirmation(&ledger::memory_block(memory.as_ref()), &log.title, &log.description);
    let reply: Statement = generate_as(ctx.generator, prompt)?;

    let subject = log.title.strip_prefix(VOTE_RESULT_PREFIX).unwrap_or(&log.title);
    let affirmation = GovernanceLog::new(
        log_type::DECISION,
        format!("{} affirms: {}", order, subject),
        reply.statement,
        order.as_str(),
        vec![order.as_str().to_string()],
        log_status::NOTED,
        ctx.now,
    );
    let log_id = ctx.storage.insert(Collection::GovernanceLogs, &affirmation)?;
    ledger::record_decision(ctx.storage, order, &format!("Affirmed vote: \"{}\"", log.title), ctx.now)?;
    ledger::adjust_relationship(ctx.storage, order, AgentId::REBELLION, Direction::Attack, ctx.now)?;

    tracing::info!("[vote-passed] {} filed affirmation {}", order, log_id);
    Ok(Step::done(format!("governance_log:{}", log_id)))
}

/// Change trigger: a governance log was created.
///
/// Passed votes not proposed by the rebellion or order agent draw a
/// rebuttal post and an affirmation log, each independent of the other.
pub fn on_log_created(ctx: &mut JobContext<'_>, log_id: &str) -> JobReport {
    let mut report = JobReport::new(Trigger::GovernanceLogCreated.as_str(), ctx.now);

    let log = match ctx.storage.get::<GovernanceLog>(Collection::GovernanceLogs, log_id) {
        Ok(Some(log)) => log,
        Ok(None) => {
            report.record(log_id, Err(Error::NotFound(format!("governance_logs/{}", log_id))));
            return report;
        }
        Err(e) => {
            report.record(log_id, Err(e));
            return report;
        }
    };

    if !log.is_vote_passed() {
        report.record(log_id, Ok(Step::skipped("not a passed vote")));
        return report;
    }
    if log.proposed_by == AgentId::REBELLION.as_str() || log.proposed_by == AgentId::ORDER.as_str() {
        report.record(log_id, Ok(Step::skipped(format!("proposed by {}", log.proposed_by))));
        return report;
    }

    tracing::info!("[vote-passed] \"{}\"", log.title);
    let rebuttal = rebut(ctx, &log);
    report.record("rebuttal", rebuttal);
    let affirmation = affirm(ctx, &log);
    report.record("affirmation", affirmation);
    report
}
