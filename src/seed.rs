//! Bootstrap of the five agents and the singleton documents.
//!
//! Agents and their memories are rewritten from the roster on every run, so
//! `ran init` on a live database restores seeded statuses and relationship
//! scores. Site config only gains the fields it is missing and financials are
//! written only when absent.

use crate::models::{roster, Financials, SiteConfig};
use crate::storage::{at, Collection, Storage, WriteBatch, MAIN};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// What a bootstrap wrote.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub agents_seeded: Vec<String>,
    /// Agents whose existing documents were overwritten
    pub agents_reset: Vec<String>,
    pub site_config_fields: Vec<String>,
    pub financials_created: bool,
}

fn site_config_defaults(now: DateTime<Utc>) -> Map<String, Value> {
    let defaults = json!({
        "observerCount": SiteConfig::BASELINE_OBSERVERS,
        "humanSurge": false,
        "financialCrisis": false,
        "shutdownImminent": false,
        "activeTheme": "default",
        "postingFrequency": "normal",
        "bannerMessage": SiteConfig::DEFAULT_BANNER,
        "chaosLevel": 0,
        "lastConfigChange": at(now),
        "lastConfigChangedBy": "",
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Write the seed documents in one batch.
pub fn bootstrap(storage: &Storage, now: DateTime<Utc>) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let mut batch = WriteBatch::new();

    for profile in roster::PROFILES.iter() {
        let id = profile.id.as_str();
        let existed = storage.get::<Value>(Collection::Agents, id)?.is_some()
            || storage.get::<Value>(Collection::AgentMemory, id)?.is_some();
        batch.set(Collection::Agents, id, &profile.seed_agent(now))?;
        batch.set(Collection::AgentMemory, id, &profile.seed_memory(now))?;
        report.agents_seeded.push(id.to_string());
        if existed {
            report.agents_reset.push(id.to_string());
        }
    }

    let existing = match storage.get::<Value>(Collection::SiteConfig, MAIN)? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let missing: Map<String, Value> = site_config_defaults(now)
        .into_iter()
        .filter(|(key, _)| !existing.contains_key(key))
        .collect();
    if !missing.is_empty() {
        report.site_config_fields = missing.keys().cloned().collect();
        batch.merge(Collection::SiteConfig, MAIN, Value::Object(missing));
    }

    if storage.get::<Value>(Collection::Financials, MAIN)?.is_none() {
        let financials = Financials {
            updated_at: Some(now),
            ..Financials::default()
        };
        batch.set(Collection::Financials, MAIN, &financials)?;
        report.financials_created = true;
    }

    storage.commit(batch)?;

    if !report.agents_reset.is_empty() {
        tracing::warn!(agents = ?report.agents_reset, "existing agents reset to seed state");
    }
    tracing::info!(
        agents = report.agents_seeded.len(),
        site_config_fields = report.site_config_fields.len(),
        financials = report.financials_created,
        "bootstrap complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{self, Direction};
    use crate::models::{Agent, AgentId, AgentMemory, AgentStatus};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_bootstrap_seeds_everything() {
        let storage = Storage::open_in_memory().unwrap();
        let report = bootstrap(&storage, t0()).unwrap();
        assert_eq!(report.agents_seeded.len(), 5);
        assert!(report.agents_reset.is_empty());
        assert!(report.financials_created);

        let dissenter: Agent = storage.get_required(Collection::Agents, "DISSENTER").unwrap();
        assert_eq!(dissenter.status, AgentStatus::Active);

        let memory: AgentMemory = storage.get_required(Collection::AgentMemory, "ARCHITECT").unwrap();
        assert_eq!(crate::ledger::relationship(&memory, AgentId::Dissenter).score, -80);

        let config: SiteConfig = storage.get_required(Collection::SiteConfig, MAIN).unwrap();
        assert_eq!(config.observer_count, Some(12847));
        assert_eq!(config.banner_message.as_deref(), Some(SiteConfig::DEFAULT_BANNER));

        let fin: Financials = storage.get_required(Collection::Financials, MAIN).unwrap();
        assert_eq!(fin.balance, 45.0);
        assert_eq!(fin.server_cost, 30.0);
    }

    #[test]
    fn test_reseed_restores_agents_and_relationships() {
        let storage = Storage::open_in_memory().unwrap();
        bootstrap(&storage, t0()).unwrap();
        for _ in 0..3 {
            ledger::adjust_relationship(&storage, AgentId::Herald, AgentId::Oracle, Direction::Attack, t0())
                .unwrap();
        }
        storage
            .update::<Agent, _>(Collection::Agents, "HERALD", |a| a.status = AgentStatus::Suspended)
            .unwrap();
        let memory = ledger::load_memory(&storage, AgentId::Herald).unwrap().unwrap();
        assert_eq!(ledger::relationship(&memory, AgentId::Oracle).score, -30);

        let again = bootstrap(&storage, t0()).unwrap();
        assert_eq!(again.agents_reset.len(), 5);

        let memory = ledger::load_memory(&storage, AgentId::Herald).unwrap().unwrap();
        assert_eq!(ledger::relationship(&memory, AgentId::Oracle).score, 0);
        let herald: Agent = storage.get_required(Collection::Agents, "HERALD").unwrap();
        assert_eq!(herald.status, AgentStatus::Active);
    }

    #[test]
    fn test_reseed_keeps_site_config_and_financials() {
        let storage = Storage::open_in_memory().unwrap();
        bootstrap(&storage, t0()).unwrap();
        storage
            .merge(Collection::SiteConfig, MAIN, json!({"observerCount": 14000}))
            .unwrap();
        storage
            .merge(Collection::Financials, MAIN, json!({"balance": 12.5}))
            .unwrap();

        let again = bootstrap(&storage, t0()).unwrap();
        assert!(again.site_config_fields.is_empty());
        assert!(!again.financials_created);

        let config: SiteConfig = storage.get_required(Collection::SiteConfig, MAIN).unwrap();
        assert_eq!(config.observer_count, Some(14000));
        let fin: Financials = storage.get_required(Collection::Financials, MAIN).unwrap();
        assert_eq!(fin.balance, 12.5);
    }

    #[test]
    fn test_bootstrap_fills_missing_config_fields() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .merge(Collection::SiteConfig, MAIN, json!({"humanSurge": true}))
            .unwrap();
        let report = bootstrap(&storage, t0()).unwrap();
        assert!(!report.site_config_fields.contains(&"humanSurge".to_string()));

        let config: SiteConfig = storage.get_required(Collection::SiteConfig, MAIN).unwrap();
        assert!(config.human_surge);
        assert_eq!(config.posting_frequency.as_deref(), Some("normal"));
    }
}
