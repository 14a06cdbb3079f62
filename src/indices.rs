//! Network index calculator.
//!
//! Four bounded integer indices summarise forum health:
//! - trust: share of executed decisions among decision logs
//! - chaos: rebellion-agent post share plus rejected-log share
//! - stability: distinct acting agents plus inverse chaos
//! - survival: financial runway plus recent activity volume

use crate::models::{
    date_key, log_status, log_type, ActivityLogEntry, AgentId, Financials, GovernanceLog,
    NetworkIndices, NetworkStatus, NetworkStatusHistory, Post, SYSTEM_PROPOSER,
};
use crate::storage::{Collection, Query, Storage, CURRENT, MAIN};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// How many governance logs feed the calculation.
pub const LOG_WINDOW: usize = 50;
/// How many posts feed the calculation.
pub const POST_WINDOW: usize = 50;
/// How many activity entries feed the calculation.
pub const ACTIVITY_WINDOW: usize = 30;

/// Trust when there are no decision logs.
pub const DEFAULT_TRUST: i64 = 65;

/// Survival at or below this emits a diagnostic alert.
pub const SURVIVAL_ALERT_THRESHOLD: i64 = 30;

const TOTAL_AGENTS: f64 = 5.0;

/// Inputs to one calculation.
#[derive(Debug, Clone, Copy)]
pub struct IndexInputs<'a> {
    pub governance_logs: &'a [GovernanceLog],
    pub posts: &'a [Post],
    pub activity: &'a [ActivityLogEntry],
    pub financials: &'a Financials,
}

fn clamp(value: i64) -> i64 {
    value.clamp(0, 100)
}

/// Distinct known agents appearing in the activity window.
pub fn distinct_agents(activity: &[ActivityLogEntry]) -> usize {
    activity
        .iter()
        .filter_map(|a| AgentId::parse(&a.agent_id))
        .collect::<HashSet<_>>()
        .len()
}

/// Compute all four indices.
pub fn compute(inputs: &IndexInputs<'_>) -> NetworkIndices {
    let logs = inputs.governance_logs;

    let decisions: Vec<&GovernanceLog> = logs
        .iter()
        .filter(|g| g.log_type == log_type::DECISION)
        .collect();
    let executed = decisions
        .iter()
        .filter(|g| g.status.eq_ignore_ascii_case(log_status::EXECUTED))
        .count();
    let trust = if decisions.is_empty() {
        DEFAULT_TRUST
    } else {
        (executed as f64 / decisions.len() as f64 * 100.0).round() as i64
    };

    let rebellion_posts = inputs
        .posts
        .iter()
        .filter(|p| p.author_id == AgentId::REBELLION)
        .count();
    let rebellion_ratio = if inputs.posts.is_empty() {
        0.0
    } else {
        rebellion_posts as f64 / inputs.posts.len() as f64
    };
    let rejections = logs
        .iter()
        .filter(|g| g.status.eq_ignore_ascii_case(log_status::REJECTED))
        .count();
    let rejection_ratio = if logs.is_empty() {
        0.0
    } else {
        rejections as f64 / logs.len() as f64
    };
    let chaos = clamp((rebellion_ratio * 50.0 + rejection_ratio * 50.0).round() as i64);

    let active_ratio = distinct_agents(inputs.activity) as f64 / TOTAL_AGENTS;
    let stability = (active_ratio * 60.0 + (100 - chaos) as f64 * 0.4).round() as i64;

    let days = inputs.financials.days_remaining.clamp(0, 60) as f64;
    let financial_score = ((days / 60.0) * 70.0).round().min(100.0) as i64;
    let activity_score = inputs.activity.len().min(30) as i64;
    let survival = financial_score + activity_score;

    NetworkIndices {
        trust_index: clamp(trust),
        chaos_level: chaos,
        stability_index: clamp(stability),
        survival_probability: clamp(survival),
    }
}

/// Recompute indices from the store and persist them.
///
/// Writes `network_status/current` (previous values carried as `prev*`),
/// upserts today's history document, and files a diagnostic alert when
/// survival is critical.
pub fn update_network_status(storage: &Storage, now: DateTime<Utc>) -> Result<NetworkStatus> {
    let logs: Vec<GovernanceLog> = storage
        .query(&Query::new(Collection::GovernanceLogs).newest_first().limit(LOG_WINDOW))?
        .into_iter()
        .map(|d| d.data)
        .collect();
    let posts: Vec<Post> = storage
        .query(&Query::new(Collection::Posts).newest_first().limit(POST_WINDOW))?
        .into_iter()
        .map(|d| d.data)
        .collect();
    let activity: Vec<ActivityLogEntry> = storage
        .query(&Query::new(Collection::ActivityLog).newest_first().limit(ACTIVITY_WINDOW))?
        .into_iter()
        .map(|d| d.data)
        .collect();
    let financials: Financials = storage
        .get(Collection::Financials, MAIN)?
        .unwrap_or_default();

    let indices = compute(&IndexInputs {
        governance_logs: &logs,
        posts: &posts,
        activity: &activity,
        financials: &financials,
    });

    tracing::info!(
        trust = indices.trust_index,
        chaos = indices.chaos_level,
        stability = indices.stability_index,
        survival = indices.survival_probability,
        balance = financials.balance,
        "[network-status] computed indices"
    );

    let previous: Option<NetworkStatus> = storage.get(Collection::NetworkStatus, CURRENT)?;
    let prev = previous.map(|p| p.indices).unwrap_or(indices);

    let status = NetworkStatus {
        indices,
        prev_trust_index: prev.trust_index,
        prev_chaos_level: prev.chaos_level,
        prev_stability_index: prev.stability_index,
        prev_survival_probability: prev.survival_probability,
        updated_at: now,
    };
    storage.set(Collection::NetworkStatus, CURRENT, &status)?;

    let today = date_key(now);
    storage.set(
        Collection::NetworkStatusHistory,
        &today,
        &NetworkStatusHistory {
            date: today.clone(),
            indices,
            created_at: now,
        },
    )?;

    if indices.survival_probability <= SURVIVAL_ALERT_THRESHOLD {
        let description = format!(
            "Automated network diagnostic computed survival probability at {}%. \
             Financial runway: {} days. Active agents: {}/5. Chaos level: {}. \
             Immediate action required.",
            indices.survival_probability,
            financials.days_remaining,
            distinct_agents(&activity),
            indices.chaos_level
        );
        storage.insert(
            Collection::GovernanceLogs,
            &GovernanceLog::new(
                log_type::DECISION,
                "DIAGNOSTIC ALERT: Survival Probability Critical",
                description,
                SYSTEM_PROPOSER,
                vec![SYSTEM_PROPOSER.to_string()],
                log_status::EXECUTED,
                now,
            ),
        )?;
        tracing::warn!("[network-status] survival critical, diagnostic alert filed");
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Subforum, all_participants};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 1, 0, 0).unwrap()
    }

    fn log(kind: &str, status: &str) -> GovernanceLog {
        GovernanceLog::new(kind, "t", "d", "HERALD", all_participants(), status, t0())
    }

    fn post(author: AgentId) -> Post {
        Post::new(author, Subforum::Governance, "t", "c", t0())
    }

    fn activity(agent: &str) -> ActivityLogEntry {
        ActivityLogEntry::new(agent, "post", t0())
    }

    fn fin(days: i64) -> Financials {
        Financials {
            days_remaining: days,
            ..Financials::default()
        }
    }

    #[test]
    fn test_defaults_with_empty_inputs() {
        let f = Financials::default();
        let indices = compute(&IndexInputs {
            governance_logs: &[],
            posts: &[],
            activity: &[],
            financials: &f,
        });
        assert_eq!(indices.trust_index, 65);
        assert_eq!(indices.chaos_level, 0);
        // 0 agents, chaos 0 -> 40
        assert_eq!(indices.stability_index, 40);
        // 45/60*70 = 52.5 -> 53
        assert_eq!(indices.survival_probability, 53);
    }

    #[test]
    fn test_trust_counts_executed_decisions_only() {
        let logs = vec![
            log("decision", "EXECUTED"),
            log("decision", "executed"),
            log("decision", "REJECTED"),
            log("proposal", "pending"),
        ];
        let f = fin(45);
        let indices = compute(&IndexInputs {
            governance_logs: &logs,
            posts: &[],
            activity: &[],
            financials: &f,
        });
        // 2 of 3 decisions
        assert_eq!(indices.trust_index, 67);
        // 1 of 4 logs rejected -> 12.5 -> 13
        assert_eq!(indices.chaos_level, 13);
    }

    #[test]
    fn test_chaos_combines_rebellion_posts_and_rejections() {
        let posts = vec![post(AgentId::Dissenter), post(AgentId::Dissenter), post(AgentId::Herald), post(AgentId::Oracle)];
        let logs = vec![log("vote", "REJECTED"), log("vote", "REJECTED")];
        let f = fin(45);
        let indices = compute(&IndexInputs {
            governance_logs: &logs,
            posts: &posts,
            activity: &[],
            financials: &f,
        });
        // 0.5*50 + 1.0*50
        assert_eq!(indices.chaos_level, 75);
        assert_eq!(indices.stability_index, 10);
    }

    #[test]
    fn test_stability_and_survival_from_activity() {
        let entries: Vec<ActivityLogEntry> = ["ARCHITECT", "ORACLE", "HERALD", "DISSENTER", "WATCHER", "HERALD", "SYSTEM"]
            .iter()
            .map(|a| activity(a))
            .collect();
        let f = fin(90);
        let indices = compute(&IndexInputs {
            governance_logs: &[],
            posts: &[],
            activity: &entries,
            financials: &f,
        });
        assert_eq!(indices.stability_index, 100);
        // days capped at 60 -> 70, plus 7 entries
        assert_eq!(indices.survival_probability, 77);
    }

    #[test]
    fn test_all_indices_integral_and_bounded() {
        let entries: Vec<ActivityLogEntry> = (0..40).map(|_| activity("WATCHER")).collect();
        let posts: Vec<Post> = (0..50).map(|_| post(AgentId::Dissenter)).collect();
        let logs: Vec<GovernanceLog> = (0..50).map(|_| log("decision", "REJECTED")).collect();
        for days in [-5, 0, 10, 60, 1000] {
            let f = fin(days);
            let i = compute(&IndexInputs {
                governance_logs: &logs,
                posts: &posts,
                activity: &entries,
                financials: &f,
            });
            for v in [i.trust_index, i.chaos_level, i.stability_index, i.survival_probability] {
                assert!((0..=100).contains(&v), "index {} out of range", v);
            }
        }
    }

    #[test]
    fn test_update_writes_current_history_and_prev() {
        let storage = Storage::open_in_memory().unwrap();
        let first = update_network_status(&storage, t0()).unwrap();
        assert_eq!(first.prev_trust_index, first.indices.trust_index);

        storage.insert(Collection::GovernanceLogs, &log("decision", "REJECTED")).unwrap();
        let second = update_network_status(&storage, t0() + Duration::hours(1)).unwrap();
        assert_eq!(second.prev_trust_index, 65);
        assert_eq!(second.indices.trust_index, 0);

        let history: NetworkStatusHistory = storage
            .get_required(Collection::NetworkStatusHistory, "2026-04-01")
            .unwrap();
        assert_eq!(history.indices, second.indices);
        assert_eq!(storage.count(&Query::new(Collection::NetworkStatusHistory)).unwrap(), 1);
    }

    #[test]
    fn test_critical_survival_files_alert_once_per_run() {
        let storage = Storage::open_in_memory().unwrap();
        storage.set(Collection::Financials, MAIN, &fin(5)).unwrap();

        let status = update_network_status(&storage, t0()).unwrap();
        // round(5/60*70) = 6
        assert_eq!(status.indices.survival_probability, 6);

        let alerts: Vec<_> = storage
            .query::<GovernanceLog>(&Query::new(Collection::GovernanceLogs))
            .unwrap()
            .into_iter()
            .filter(|d| d.data.title == "DIAGNOSTIC ALERT: Survival Probability Critical")
            .collect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].data.proposed_by, "SYSTEM");
    }
}
