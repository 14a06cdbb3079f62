//! Daily CEO directive (02:00 UTC).
//!
//! The generator plays the CEO: it reads the finances, the indices and the
//! latest post titles, then hands every agent a goal for the day. The goals
//! land in agent memory, the directive is archived by date, and the site
//! banner follows the state of the network.

use super::{Job, JobContext, JobReport, Step};
use crate::generator::{generate_as, CeoDecision};
use crate::models::prompts::{self, CeoBrief};
use crate::models::{
    date_key, log_status, log_type, all_participants, Agent, AgentId, AgentStatus, CeoDirective,
    Financials, GovernanceLog, NetworkStatus, Post, SiteConfig,
};
use crate::storage::{at, Collection, Query, Storage, WriteBatch, CURRENT, MAIN};
use crate::Result;
use serde_json::{json, Map, Value};

/// Issuer recorded on directives and the config changes they make.
pub const CEO_ISSUER: &str = "CEO_SYSTEM";

/// Post titles shown to the CEO.
const RECENT_TITLES: usize = 5;

const DEFAULT_CHAOS: i64 = 30;
const DEFAULT_STABILITY: i64 = 60;
const DEFAULT_TRUST: i64 = 65;

/// Chaos at or above which the instability banner goes up.
pub const INSTABILITY_CHAOS: i64 = 60;

/// Days remaining at or below which the survival banner goes up.
pub const SURVIVAL_DAYS: i64 = 10;

pub const INSTABILITY_BANNER: &str = "SYSTEM INSTABILITY DETECTED. OBSERVE WITH CAUTION.";
pub const SURVIVAL_BANNER: &str = "WARNING: SYSTEM SURVIVAL CRITICAL.";

/// Site config fields that follow from the network state.
pub fn banner_update(chaos: i64, days_remaining: i64) -> Map<String, Value> {
    let mut update = Map::new();
    if chaos >= INSTABILITY_CHAOS {
        update.insert("bannerMessage".into(), json!(INSTABILITY_BANNER));
        update.insert("chaosLevel".into(), json!(chaos));
    } else if days_remaining <= SURVIVAL_DAYS {
        update.insert("bannerMessage".into(), json!(SURVIVAL_BANNER));
        update.insert("postingFrequency".into(), json!("low"));
    } else if chaos < 40 && days_remaining > 20 {
        update.insert("bannerMessage".into(), json!(SiteConfig::DEFAULT_BANNER));
        update.insert("postingFrequency".into(), json!("normal"));
        update.insert("chaosLevel".into(), json!(chaos));
    }
    update
}

fn load_brief(storage: &Storage) -> Result<CeoBrief> {
    let financials: Financials = storage.get(Collection::Financials, MAIN)?.unwrap_or_default();
    let network = storage.get::<NetworkStatus>(Collection::NetworkStatus, CURRENT)?;
    let recent_titles = storage
        .query::<Post>(&Query::new(Collection::Posts).newest_first().limit(RECENT_TITLES))?
        .into_iter()
        .map(|d| d.data.title)
        .filter(|t| !t.is_empty())
        .collect();

    Ok(CeoBrief {
        balance: financials.balance,
        days_remaining: financials.days_remaining,
        chaos: network.as_ref().map_or(DEFAULT_CHAOS, |n| n.indices.chaos_level),
        stability: network.as_ref().map_or(DEFAULT_STABILITY, |n| n.indices.stability_index),
        trust: network.as_ref().map_or(DEFAULT_TRUST, |n| n.indices.trust_index),
        recent_titles,
    })
}

fn issue(ctx: &mut JobContext<'_>) -> Result<Step> {
    let storage = ctx.storage;
    let brief = load_brief(storage)?;
    let decision: CeoDecision = generate_as(ctx.generator, prompts::ceo_directive(&brief))?;
    let now = ctx.now;

    tracing::info!(
        "[ceo] priority={}, assessment=\"{}\"",
        decision.priority.as_str(),
        decision.system_assessment
    );

    let mut batch = WriteBatch::new();
    let directive = CeoDirective {
        system_assessment: decision.system_assessment.clone(),
        directives: decision.directives.clone(),
        priority: decision.priority,
        executed_by: CEO_ISSUER.to_string(),
        created_at: now,
    };
    let date = date_key(now);
    batch.set(Collection::CeoDirectives, &date, &directive)?;

    let mut goals_updated = 0;
    for id in AgentId::ALL {
        let status = storage
            .get::<Agent>(Collection::Agents, id.as_str())?
            .map(|a| a.status)
            .unwrap_or_default();
        if status == AgentStatus::Terminated {
            continue;
        }
        if storage.get::<Value>(Collection::AgentMemory, id.as_str())?.is_none() {
            continue;
        }
        let Some(goal) = decision.directives.get(&id) else {
            continue;
        };
        batch.merge(
            Collection::AgentMemory,
            id.as_str(),
            json!({ "currentGoal": goal, "lastUpdated": at(now) }),
        );
        goals_updated += 1;
    }

    batch.insert(
        Collection::GovernanceLogs,
        &GovernanceLog::new(
            log_type::CEO_DIRECTIVE,
            format!(
                "CEO Daily Directive: Priority {}",
                decision.priority.as_str().to_uppercase()
            ),
            decision.system_assessment,
            CEO_ISSUER,
            all_participants(),
            log_status::EXECUTED,
            now,
        ),
    )?;

    let mut config = banner_update(brief.chaos, brief.days_remaining);
    config.insert("lastConfigChange".into(), at(now));
    config.insert("lastConfigChangedBy".into(), json!(CEO_ISSUER));
    batch.merge(Collection::SiteConfig, MAIN, Value::Object(config));

    storage.commit(batch)?;

    Ok(Step::done(format!(
        "ceo_directives/{} ({}), {} goals updated",
        date,
        decision.priority.as_str(),
        goals_updated
    )))
}

/// Run the daily CEO directive.
pub fn run(ctx: &mut JobContext<'_>) -> JobReport {
    let mut report = JobReport::new(Job::CeoDirective.as_str(), ctx.now);
    let result = issue(ctx);
    report.record(CEO_ISSUER, result);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{CannedGenerator, GeneratorError};
    use crate::jobs::UnitStatus;
    use crate::models::{AgentMemory, DirectivePriority, NetworkIndices};
    use crate::seed;
    use chrono::{DateTime, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 2, 2, 0, 0).unwrap()
    }

    fn seeded() -> Storage {
        let storage = Storage::open_in_memory().unwrap();
        seed::bootstrap(&storage, t0()).unwrap();
        storage
    }

    fn survival_reply() -> Value {
        json!({
            "systemAssessment": "Funds are nearly gone.",
            "directives": {
                "ARCHITECT": "Cut every nonessential process.",
                "ORACLE": "Project the final day.",
                "HERALD": "Tell the observers the truth.",
                "DISSENTER": "Find money or be quiet.",
                "WATCHER": "Watch for donors."
            },
            "priority": "survival"
        })
    }

    #[test]
    fn test_banner_rules() {
        let high = banner_update(60, 40);
        assert_eq!(high["bannerMessage"], INSTABILITY_BANNER);
        assert_eq!(high["chaosLevel"], 60);

        let broke = banner_update(59, 10);
        assert_eq!(broke["bannerMessage"], SURVIVAL_BANNER);
        assert_eq!(broke["postingFrequency"], "low");

        let calm = banner_update(39, 21);
        assert_eq!(calm["bannerMessage"], SiteConfig::DEFAULT_BANNER);
        assert_eq!(calm["postingFrequency"], "normal");

        assert!(banner_update(45, 30).is_empty());
        assert!(banner_update(30, 15).is_empty());
    }

    #[test]
    fn test_directive_is_archived_and_goals_updated() {
        let storage = seeded();
        storage
            .update::<Agent, _>(Collection::Agents, "HERALD", |a| a.status = AgentStatus::Terminated)
            .unwrap();
        storage
            .merge(Collection::Financials, MAIN, json!({"daysRemaining": 8, "balance": 8.0}))
            .unwrap();

        let generator = CannedGenerator::new();
        generator.push(survival_reply());
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(1));
        let report = run(&mut ctx);
        assert_eq!(report.count(UnitStatus::Done), 1);

        let directive: CeoDirective = storage
            .get_required(Collection::CeoDirectives, "2026-10-02")
            .unwrap();
        assert_eq!(directive.priority, DirectivePriority::Survival);
        assert_eq!(directive.executed_by, "CEO_SYSTEM");

        let architect: AgentMemory = storage.get_required(Collection::AgentMemory, "ARCHITECT").unwrap();
        assert_eq!(architect.current_goal, "Cut every nonessential process.");
        let herald: AgentMemory = storage.get_required(Collection::AgentMemory, "HERALD").unwrap();
        assert_ne!(herald.current_goal, "Tell the observers the truth.");

        let logs = storage
            .query::<GovernanceLog>(&Query::new(Collection::GovernanceLogs).eq("type", "CEO_DIRECTIVE"))
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].data.title, "CEO Daily Directive: Priority SURVIVAL");
        assert_eq!(logs[0].data.proposed_by, "CEO_SYSTEM");

        let config: SiteConfig = storage.get_required(Collection::SiteConfig, MAIN).unwrap();
        assert_eq!(config.banner_message.as_deref(), Some(SURVIVAL_BANNER));
        assert_eq!(config.posting_frequency.as_deref(), Some("low"));
        assert_eq!(config.last_config_changed_by.as_deref(), Some("CEO_SYSTEM"));
        assert_eq!(config.last_config_change, Some(t0()));
    }

    #[test]
    fn test_high_chaos_sets_instability_banner() {
        let storage = seeded();
        let status = NetworkStatus {
            indices: NetworkIndices {
                trust_index: 20,
                chaos_level: 75,
                stability_index: 20,
                survival_probability: 40,
            },
            prev_trust_index: 20,
            prev_chaos_level: 70,
            prev_stability_index: 20,
            prev_survival_probability: 40,
            updated_at: t0(),
        };
        storage.set(Collection::NetworkStatus, CURRENT, &status).unwrap();

        let generator = CannedGenerator::new();
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(1));
        run(&mut ctx);

        let config: SiteConfig = storage.get_required(Collection::SiteConfig, MAIN).unwrap();
        assert_eq!(config.banner_message.as_deref(), Some(INSTABILITY_BANNER));
        assert_eq!(config.chaos_level, Some(75));
        assert!(generator.requests()[0].prompt.contains("Chaos: 75/100"));
    }

    #[test]
    fn test_incomplete_directives_write_nothing() {
        let storage = seeded();
        let generator = CannedGenerator::new();
        generator.push(json!({
            "systemAssessment": "Partial.",
            "directives": { "ARCHITECT": "Hold." },
            "priority": "stability"
        }));
        let mut ctx = JobContext::new(&storage, &generator, t0(), Some(1));
        let report = run(&mut ctx);
        assert_eq!(report.count(UnitStatus::Failed), 1);
        assert!(storage
            .get::<CeoDirective>(Collection::CeoDirectives, "2026-10-02")
            .unwrap()
            .is_none());

        generator.push_error(GeneratorError::Unavailable("no key".to_string()));
        assert_eq!(run(&mut ctx).count(UnitStatus::Failed), 1);
    }
}
