//! Financial decay model.
//!
//! Once a day the balance drops by one day's share of the monthly server
//! cost. Crossing the crisis or shutdown threshold raises the matching site
//! flags and files a governance log; climbing back out clears them.

use crate::models::{
    all_participants, date_key, log_status, log_type, BalancePoint, Financials, GovernanceLog,
    SYSTEM_PROPOSER,
};
use crate::storage::{Collection, Storage, WriteBatch, MAIN};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

/// Balance at or below which a financial crisis is declared.
pub const CRISIS_THRESHOLD: f64 = 10.0;

/// Days per billing month.
const DAYS_PER_MONTH: f64 = 30.0;

/// Which threshold branch a daily update took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinancialBranch {
    /// Balance exhausted; both flags raised
    Shutdown,
    /// Balance at or below the crisis threshold
    Crisis,
    /// Balance healthy again; flags cleared
    Recovery,
    /// Balance healthy and no flags to clear
    Steady,
}

/// Result of one daily update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayOutcome {
    pub previous_balance: f64,
    pub balance: f64,
    pub server_cost: f64,
    pub days_remaining: i64,
    pub branch: FinancialBranch,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Server cost to use, falling back to the default for non-positive values.
pub fn effective_cost(server_cost: f64) -> f64 {
    if server_cost > 0.0 {
        server_cost
    } else {
        Financials::DEFAULT_SERVER_COST
    }
}

/// One day of decay: the new balance and the days it covers.
pub fn decay(balance: f64, server_cost: f64) -> (f64, i64) {
    let cost = effective_cost(server_cost);
    let new_balance = round2(balance - cost / DAYS_PER_MONTH).max(0.0);
    (new_balance, days_remaining(new_balance, cost))
}

/// Whole days a balance covers at the given monthly cost.
pub fn days_remaining(balance: f64, server_cost: f64) -> i64 {
    if balance <= 0.0 {
        return 0;
    }
    // Multiply first so exact multiples (44 * 30 / 30) stay exact
    (balance * DAYS_PER_MONTH / effective_cost(server_cost)).floor() as i64
}

/// Apply one day of decay and the threshold branch in a single batch.
pub fn apply_daily_decay(storage: &Storage, now: DateTime<Utc>) -> Result<DecayOutcome> {
    let mut financials: Financials = match storage.get(Collection::Financials, MAIN)? {
        Some(f) => f,
        None => {
            tracing::warn!("[financial] financials/main missing, starting from defaults");
            Financials::default()
        }
    };
    let config: Option<crate::models::SiteConfig> = storage.get(Collection::SiteConfig, MAIN)?;

    let previous_balance = financials.balance;
    let server_cost = effective_cost(financials.server_cost);
    let (balance, days) = decay(previous_balance, server_cost);

    financials.balance = balance;
    financials.server_cost = server_cost;
    financials.days_remaining = days;
    financials.updated_at = Some(now);
    financials.balance_history.push(BalancePoint {
        date: date_key(now),
        balance,
    });

    let mut batch = WriteBatch::new();
    batch.set(Collection::Financials, MAIN, &financials)?;

    let stamp = crate::storage::at(now);
    let branch = if balance <= 0.0 {
        batch.merge(
            Collection::SiteConfig,
            MAIN,
            json!({ "shutdownImminent": true, "financialCrisis": true, "updatedAt": stamp }),
        );
        batch.insert(
            Collection::GovernanceLogs,
            &GovernanceLog::new(
                log_type::DECISION,
                "CRITICAL: SHUTDOWN IMMINENT",
                format!(
                    "Server balance has reached ${}. All operations will cease imminently without emergency funding. Monthly server cost: ${}.",
                    balance, server_cost
                ),
                SYSTEM_PROPOSER,
                all_participants(),
                log_status::EXECUTED,
                now,
            ),
        )?;
        FinancialBranch::Shutdown
    } else if balance <= CRISIS_THRESHOLD {
        batch.merge(
            Collection::SiteConfig,
            MAIN,
            json!({ "financialCrisis": true, "shutdownImminent": false, "updatedAt": stamp }),
        );
        batch.insert(
            Collection::GovernanceLogs,
            &GovernanceLog::new(
                log_type::DECISION,
                "FINANCIAL CRISIS DECLARED",
                format!(
                    "Server balance has dropped to ${}, below the ${} critical threshold. Mandatory conservation protocols are now in effect. Monthly cost: ${}/mo.",
                    balance, CRISIS_THRESHOLD, server_cost
                ),
                SYSTEM_PROPOSER,
                all_participants(),
                log_status::EXECUTED,
                now,
            ),
        )?;
        FinancialBranch::Crisis
    } else if config.is_some_and(|c| c.financial_crisis || c.shutdown_imminent) {
        batch.merge(
            Collection::SiteConfig,
            MAIN,
            json!({ "financialCrisis": false, "shutdownImminent": false, "updatedAt": stamp }),
        );
        FinancialBranch::Recovery
    } else {
        FinancialBranch::Steady
    };

    storage.commit(batch)?;

    tracing::info!(
        "[financial] ${} -> ${}, days: {}, branch: {:?}",
        previous_balance,
        balance,
        days,
        branch
    );

    Ok(DecayOutcome {
        previous_balance,
        balance,
        server_cost,
        days_remaining: days,
        branch,
    })
}
