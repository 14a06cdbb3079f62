//! Scheduled jobs and change triggers.
//!
//! A job runs its steps one after another against the store. Each unit of
//! work (an agent, a proposal, a queued reaction) produces its own result,
//! collected into a [`JobReport`]; one failing unit never stops its
//! siblings and no error escapes [`run_job`].
//!
//! Triggers react to rows in the change-event outbox. [`dispatch_changes`]
//! drains it, including events raised by the triggers themselves.

pub mod activity;
pub mod directives;
pub mod governance;
pub mod observers;

use crate::generator::ContentGenerator;
use crate::storage::{ChangeEvent, ChangeKind, Collection, Storage};
use crate::{finance, indices, lifecycle, reactions, Error, Result};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fmt;

/// Everything a job needs: the store, the generator, randomness and the
/// nominal invocation time.
pub struct JobContext<'a> {
    pub storage: &'a Storage,
    pub generator: &'a dyn ContentGenerator,
    pub rng: StdRng,
    pub now: DateTime<Utc>,
}

impl<'a> JobContext<'a> {
    /// Create a context. Without a seed the RNG is seeded from entropy.
    pub fn new(
        storage: &'a Storage,
        generator: &'a dyn ContentGenerator,
        now: DateTime<Utc>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            storage,
            generator,
            rng,
            now,
        }
    }
}

/// Jobs that can be run on a schedule or by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Job {
    Activity,
    VoteTally,
    Financial,
    Observers,
    NetworkStatus,
    WatcherReport,
    OracleUpdate,
    CeoDirective,
    Reactions,
    Lifecycle,
}

impl Job {
    pub const ALL: [Job; 10] = [
        Job::Activity,
        Job::VoteTally,
        Job::Financial,
        Job::Observers,
        Job::NetworkStatus,
        Job::WatcherReport,
        Job::OracleUpdate,
        Job::CeoDirective,
        Job::Reactions,
        Job::Lifecycle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::VoteTally => "vote-tally",
            Self::Financial => "financial",
            Self::Observers => "observers",
            Self::NetworkStatus => "network-status",
            Self::WatcherReport => "watcher-report",
            Self::OracleUpdate => "oracle-update",
            Self::CeoDirective => "ceo-directive",
            Self::Reactions => "reactions",
            Self::Lifecycle => "lifecycle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|job| job.as_str() == s)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Job {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            let known: Vec<_> = Self::ALL.iter().map(Job::as_str).collect();
            Error::InvalidInput(format!("unknown job '{}', expected one of: {}", s, known.join(", ")))
        })
    }
}

/// What happened to one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Done,
    Skipped,
    Failed,
}

/// Successful result of a unit: done with a summary, or skipped with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Done(String),
    Skipped(String),
}

impl Step {
    pub fn done(detail: impl Into<String>) -> Self {
        Self::Done(detail.into())
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub unit: String,
    pub status: UnitStatus,
    pub detail: String,
}

/// Per-unit results of one job or trigger run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job: String,
    #[serde(with = "crate::models::timestamp")]
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<UnitOutcome>,
}

impl JobReport {
    pub fn new(job: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            job: job.into(),
            started_at,
            outcomes: Vec::new(),
        }
    }

    /// Record the result of one unit, logging skips and failures.
    pub fn record(&mut self, unit: impl Into<String>, result: Result<Step>) {
        let unit = unit.into();
        let (status, detail) = match result {
            Ok(Step::Done(detail)) => (UnitStatus::Done, detail),
            Ok(Step::Skipped(reason)) => {
                tracing::warn!(job = %self.job, %unit, "skipped: {}", reason);
                (UnitStatus::Skipped, reason)
            }
            Err(e) => {
                tracing::error!(job = %self.job, %unit, "failed: {}", e);
                (UnitStatus::Failed, e.to_string())
            }
        };
        self.outcomes.push(UnitOutcome {
            unit,
            status,
            detail,
        });
    }

    pub fn count(&self, status: UnitStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Outcome for a named unit, if recorded.
    pub fn outcome(&self, unit: &str) -> Option<&UnitOutcome> {
        self.outcomes.iter().find(|o| o.unit == unit)
    }
}

/// Run one job to completion.
pub fn run_job(ctx: &mut JobContext<'_>, job: Job) -> JobReport {
    tracing::info!(job = %job, now = %ctx.now, "job started");

    let report = match job {
        Job::Activity => activity::run(ctx),
        Job::VoteTally => governance::tally_votes(ctx),
        Job::Financial => {
            let mut report = JobReport::new(job.as_str(), ctx.now);
            let result = finance::apply_daily_decay(ctx.storage, ctx.now).map(|o| {
                Step::done(format!(
                    "balance ${} -> ${}, {} days, {:?}",
                    o.previous_balance, o.balance, o.days_remaining, o.branch
                ))
            });
            report.record("financials", result);
            report
        }
        Job::Observers => observers::simulate_observers(ctx),
        Job::NetworkStatus => {
            let mut report = JobReport::new(job.as_str(), ctx.now);
            let result = indices::update_network_status(ctx.storage, ctx.now).map(|s| {
                Step::done(format!(
                    "trust {} chaos {} stability {} survival {}",
                    s.indices.trust_index,
                    s.indices.chaos_level,
                    s.indices.stability_index,
                    s.indices.survival_probability
                ))
            });
            report.record("network_status", result);
            report
        }
        Job::WatcherReport => observers::watcher_report(ctx),
        Job::OracleUpdate => observers::oracle_update(ctx),
        Job::CeoDirective => directives::run(ctx),
        Job::Reactions => reactions::drain(ctx),
        Job::Lifecycle => run_lifecycle(ctx),
    };

    tracing::info!(
        job = %job,
        done = report.count(UnitStatus::Done),
        skipped = report.count(UnitStatus::Skipped),
        failed = report.count(UnitStatus::Failed),
        "job finished"
    );
    report
}

fn run_lifecycle(ctx: &mut JobContext<'_>) -> JobReport {
    let mut report = JobReport::new(Job::Lifecycle.as_str(), ctx.now);
    for agent in crate::models::AgentId::ALL {
        let result = lifecycle::check_agent(ctx.storage, agent, ctx.now).map(|o| match o.transition {
            lifecycle::Transition::Unchanged { note } => Step::Skipped(note),
            other => Step::Done(format!("{:?}", other)),
        });
        report.record(agent.as_str(), result);
    }
    report
}

/// Triggers fired by change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A post was created
    PostCreated,
    /// A governance log was created
    GovernanceLogCreated,
    /// `network_status/current` was written
    NetworkStatusWritten,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostCreated => "on-post-created",
            Self::GovernanceLogCreated => "on-governance-log-created",
            Self::NetworkStatusWritten => "on-network-status-written",
        }
    }

    /// The trigger an event fires, if any.
    pub fn for_event(event: &ChangeEvent) -> Option<Self> {
        match (event.collection, event.kind) {
            (Collection::Posts, ChangeKind::Created) => Some(Self::PostCreated),
            (Collection::GovernanceLogs, ChangeKind::Created) => Some(Self::GovernanceLogCreated),
            (Collection::NetworkStatus, _) => Some(Self::NetworkStatusWritten),
            _ => None,
        }
    }
}

/// Events read from the outbox per round.
const DISPATCH_BATCH: usize = 100;

/// Drain the change-event outbox, running the trigger for each event.
///
/// Events raised while dispatching are handled in later rounds. Stops after
/// `max_events` events so a feedback loop cannot run forever.
pub fn dispatch_changes(ctx: &mut JobContext<'_>, max_events: usize) -> Result<Vec<JobReport>> {
    let mut reports = Vec::new();
    let mut handled = 0;

    while handled < max_events {
        let events = ctx
            .storage
            .pending_events(DISPATCH_BATCH.min(max_events - handled))?;
        if events.is_empty() {
            break;
        }

        for event in events {
            handled += 1;
            if let Some(trigger) = Trigger::for_event(&event) {
                tracing::debug!(trigger = trigger.as_str(), doc = %event.doc_id, "dispatching");
                let report = match trigger {
                    Trigger::PostCreated => reactions::on_post_created(ctx, &event.doc_id),
                    Trigger::GovernanceLogCreated => governance::on_log_created(ctx, &event.doc_id),
                    Trigger::NetworkStatusWritten => observers::on_network_status_written(ctx),
                };
                reports.push(report);
            }
            ctx.storage.mark_event_processed(event.seq)?;
        }
    }

    Ok(reports)
}
