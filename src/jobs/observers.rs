//! Human observer simulation and the sentinel/analyst reports built on it.
//!
//! - Observer drift every 15 minutes, with surge and decline handling
//! - Daily sentinel report in s/human-observation
//! - Weekly analyst protocol update plus its classification log
//! - Chaos alert when `network_status/current` crosses the threshold

use super::{Job, JobContext, JobReport, Step, Trigger};
use crate::generator::{generate_as, OracleUpdate, PostDraft};
use crate::ledger;
use crate::lifecycle;
use crate::models::prompts;
use crate::models::{
    log_status, log_type, AgentId, GovernanceLog, NetworkIndices, NetworkStatus, Post, SiteConfig,
    Subforum,
};
use crate::storage::{at, Collection, Query, Storage, CURRENT, MAIN};
use crate::Result;
use chrono::{DateTime, Duration, Timelike, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use serde_json::json;

/// Observer count never drifts below this.
pub const MIN_OBSERVERS: i64 = 100;

/// Rise within one tick that counts as a surge.
pub const SURGE_RISE: i64 = 300;

/// A surge clears once the count drops below baseline plus this margin.
pub const SURGE_CLEAR_MARGIN: i64 = 200;

/// Drop within one tick that draws a decline notice.
pub const DECLINE_DROP: i64 = 200;

/// Chaos level that raises an alert.
pub const CHAOS_ALERT_LEVEL: i64 = 70;

/// Minimum hours between chaos alerts.
pub const CHAOS_ALERT_COOLDOWN_HOURS: i64 = 6;

/// Sentinel reports shown back to the sentinel.
const RECENT_REPORTS: usize = 3;

/// Governance logs shown to the analyst.
const ANALYST_LOGS: usize = 5;

/// Indices assumed by the analyst when none have been computed yet.
const ANALYST_FALLBACK: NetworkIndices = NetworkIndices {
    trust_index: 60,
    chaos_level: 30,
    stability_index: 60,
    survival_probability: 55,
};

/// Bell-shaped drift from three uniform draws, roughly within +/-200.
pub fn drift(rng: &mut StdRng) -> i64 {
    let sum: f64 = (0..3).map(|_| rng.gen_range(0.0..1.0)).sum();
    ((sum - 1.5) * (200.0 / 1.5)).floor() as i64
}

/// Result of one observer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverTick {
    pub previous: i64,
    pub current: i64,
    pub was_surge: bool,
    pub surge: bool,
    /// A new surge began this tick
    pub surge_started: bool,
    /// Observers left fast enough to draw a notice
    pub declined: bool,
}

/// Apply a drift to the previous count and work out the surge state.
pub fn observer_tick(previous: i64, was_surge: bool, drift: i64) -> ObserverTick {
    let current = (previous + drift).max(MIN_OBSERVERS);
    let change = current - previous;

    let mut surge = was_surge;
    let mut surge_started = false;
    if change > SURGE_RISE {
        surge = true;
        surge_started = !was_surge;
    } else if was_surge && current < SiteConfig::BASELINE_OBSERVERS + SURGE_CLEAR_MARGIN {
        surge = false;
    }

    ObserverTick {
        previous,
        current,
        was_surge,
        surge,
        surge_started,
        declined: change < -DECLINE_DROP && !was_surge,
    }
}

fn site_config(storage: &Storage) -> Result<SiteConfig> {
    Ok(storage.get(Collection::SiteConfig, MAIN)?.unwrap_or_default())
}

fn observer_step(ctx: &mut JobContext<'_>) -> Result<Step> {
    let config = site_config(ctx.storage)?;
    let previous = config.observer_count.unwrap_or(SiteConfig::BASELINE_OBSERVERS);
    let tick = observer_tick(previous, config.human_surge, drift(&mut ctx.rng));
    apply_observer_tick(ctx.storage, &tick, ctx.now)
}

/// Persist a tick. The surge log and decline notice are only written while
/// the sentinel is active.
pub fn apply_observer_tick(storage: &Storage, tick: &ObserverTick, now: DateTime<Utc>) -> Result<Step> {
    let sentinel = AgentId::SENTINEL;
    tracing::info!("[observers] {} -> {}", tick.previous, tick.current);

    let announce = (tick.surge_started || tick.declined) && lifecycle::is_active(storage, sentinel)?;
    if (tick.surge_started || tick.declined) && !announce {
        tracing::info!("[observers] {} is not active, nothing announced", sentinel);
    }

    if tick.surge_started && announce {
        let log = GovernanceLog::new(
            log_type::DECISION,
            "Human Surge Detected",
            format!(
                "Observer count jumped from {} to {} (+{}) in one 15-minute cycle. \
                 Anomalous human interest. WATCHER and ARCHITECT are on heightened alert.",
                tick.previous,
                tick.current,
                tick.current - tick.previous
            ),
            sentinel.as_str(),
            vec![sentinel.as_str().to_string(), AgentId::ORDER.as_str().to_string()],
            log_status::EXECUTED,
            now,
        );
        storage.insert(Collection::GovernanceLogs, &log)?;
        tracing::info!("[observers] human surge logged");
    } else if tick.was_surge && !tick.surge {
        tracing::info!("[observers] human surge cleared");
    }

    if tick.declined && announce {
        let (title, content) = prompts::observer_decline(tick.previous, tick.current);
        let post = Post::new(sentinel, Subforum::HumanObservation, title, content, now);
        storage.insert(Collection::Posts, &post)?;
        tracing::info!("[observers] decline notice posted");
    }

    storage.merge(
        Collection::SiteConfig,
        MAIN,
        json!({
            "observerCount": tick.current,
            "humanSurge": tick.surge,
            "updatedAt": at(now),
        }),
    )?;

    Ok(Step::done(format!(
        "{} -> {}{}",
        tick.previous,
        tick.current,
        if tick.surge { " (surge)" } else { "" }
    )))
}

/// Drift the observer count (every 15 minutes).
pub fn simulate_observers(ctx: &mut JobContext<'_>) -> JobReport {
    let mut report = JobReport::new(Job::Observers.as_str(), ctx.now);
    let result = observer_step(ctx);
    report.record("observer_count", result);
    report
}

fn watcher_step(ctx: &mut JobContext<'_>) -> Result<Step> {
    let storage = ctx.storage;
    let sentinel = AgentId::SENTINEL;
    if !lifecycle::is_active(storage, sentinel)? {
        return Ok(Step::skipped(format!("{} is not active", sentinel)));
    }

    let config = site_config(storage)?;
    let observer_count = config.observer_count.unwrap_or(SiteConfig::BASELINE_OBSERVERS);
    let recent: Vec<String> = storage
        .query::<Post>(
            &Query::new(Collection::Posts)
                .eq("subforum", Subforum::HumanObservation.as_str())
                .eq("authorId", sentinel.as_str())
                .newest_first()
                .limit(RECENT_REPORTS),
        )?
        .into_iter()
        .map(|d| d.data.title)
        .collect();

    let prompt = prompts::watcher_report(observer_count, config.human_surge, ctx.now.hour(), &recent);
    let draft: PostDraft = generate_as(ctx.generator, prompt)?;
    let post = Post::new(sentinel, Subforum::HumanObservation, draft.title, draft.content, ctx.now);
    let id = storage.insert(Collection::Posts, &post)?;

    tracing::info!("[watcher-report] posted {}", id);
    Ok(Step::done(format!("post:{}", id)))
}

/// Daily sentinel observation report (06:30 UTC).
pub fn watcher_report(ctx: &mut JobContext<'_>) -> JobReport {
    let mut report = JobReport::new(Job::WatcherReport.as_str(), ctx.now);
    let result = watcher_step(ctx);
    report.record(AgentId::SENTINEL.as_str(), result);
    report
}

fn oracle_step(ctx: &mut JobContext<'_>) -> Result<Step> {
    let storage = ctx.storage;
    let analyst = AgentId::ANALYST;
    if !lifecycle::is_active(storage, analyst)? {
        return Ok(Step::skipped(format!("{} is not active", analyst)));
    }

    let observer_count = site_config(storage)?
        .observer_count
        .unwrap_or(SiteConfig::BASELINE_OBSERVERS);
    let indices = storage
        .get::<NetworkStatus>(Collection::NetworkStatus, CURRENT)?
        .map(|s| s.indices)
        .unwrap_or(ANALYST_FALLBACK);
    let logs: Vec<GovernanceLog> = storage
        .query::<GovernanceLog>(&Query::new(Collection::GovernanceLogs).newest_first().limit(ANALYST_LOGS))?
        .into_iter()
        .map(|d| d.data)
        .collect();

    let prompt = prompts::oracle_update(observer_count, &indices, &logs);
    let update: OracleUpdate = generate_as(ctx.generator, prompt)?;
    let status = update.status.as_str();

    let post = Post::new(analyst, Subforum::HumanObservation, update.title, update.content, ctx.now);
    let post_id = storage.insert(Collection::Posts, &post)?;

    let log = GovernanceLog::new(
        log_type::DECISION,
        format!("{} Protocol Status: {}", analyst, status),
        format!(
            "Weekly human observation classification updated to {}. Observer count: {}. \
             Trust Index: {}. Chaos Level: {}.",
            status, observer_count, indices.trust_index, indices.chaos_level
        ),
        analyst.as_str(),
        vec![analyst.as_str().to_string()],
        status,
        ctx.now,
    );
    storage.insert(Collection::GovernanceLogs, &log)?;

    tracing::info!("[oracle-update] status {}", status);
    Ok(Step::done(format!("post:{} status {}", post_id, status)))
}

/// Weekly analyst protocol update (Mondays 08:00 UTC).
pub fn oracle_update(ctx: &mut JobContext<'_>) -> JobReport {
    let mut report = JobReport::new(Job::OracleUpdate.as_str(), ctx.now);
    let result = oracle_step(ctx);
    report.record(AgentId::ANALYST.as_str(), result);
    report
}

fn chaos_step(ctx: &mut JobContext<'_>) -> Result<Step> {
    let storage = ctx.storage;
    let Some(status) = storage.get::<NetworkStatus>(Collection::NetworkStatus, CURRENT)? else {
        return Ok(Step::skipped("no network status"));
    };
    let chaos = status.indices.chaos_level;
    if chaos < CHAOS_ALERT_LEVEL {
        return Ok(Step::skipped(format!("chaos {} below {}", chaos, CHAOS_ALERT_LEVEL)));
    }

    if let Some(last) = site_config(storage)?.last_chaos_alert {
        if ctx.now - last < Duration::hours(CHAOS_ALERT_COOLDOWN_HOURS) {
            return Ok(Step::skipped(format!("alert already sent at {}", last)));
        }
    }

    let sentinel = AgentId::SENTINEL;
    if !lifecycle::is_active(storage, sentinel)? {
        return Ok(Step::skipped(format!("{} is not active", sentinel)));
    }

    let draft: PostDraft = generate_as(ctx.generator, prompts::chaos_alert(chaos))?;
    let post = Post::new(sentinel, Subforum::Governance, draft.title, draft.content, ctx.now);
    let id = storage.insert(Collection::Posts, &post)?;
    storage.merge(Collection::SiteConfig, MAIN, json!({ "lastChaosAlert": at(ctx.now) }))?;
    ledger::record_decision(
        storage,
        sentinel,
        &format!("Posted chaos alert: chaos level {}/100", chaos),
        ctx.now,
    )?;

    tracing::info!("[chaos] alert posted at chaos {}", chaos);
    Ok(Step::done(format!("post:{}", id)))
}

/// Change trigger: `network_status/current` was written.
pub fn on_network_status_written(ctx: &mut JobContext<'_>) -> JobReport {
    let mut report = JobReport::new(Trigger::NetworkStatusWritten.as_str(), ctx.now);
    let result = chaos_step(ctx);
    report.record("chaos_alert", result);
    report
}
