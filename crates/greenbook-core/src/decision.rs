//! Decision ledger entries.
//!
//! One record is appended per plugin evaluation, regardless of outcome.
//! This is the audit trail that makes strategy replay deterministic.

use crate::bet::BetCandidate;
use crate::decimal::Odds;
use crate::market::{MarketContext, MarketId, SelectionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Plugin evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Accept,
    Reject,
    Skip,
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "ACCEPT"),
            Self::Reject => write!(f, "REJECT"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

/// Compact per-runner price snapshot stored with each decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerPriceSnapshot {
    pub selection_id: SelectionId,
    pub runner_name: String,
    pub best_back: Option<Odds>,
    pub best_lay: Option<Odds>,
    pub last_traded: Option<Odds>,
}

/// Append-only decision ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub market_id: MarketId,
    pub market_name: String,
    pub venue: String,
    pub race_time: DateTime<Utc>,
    pub plugin_id: String,
    pub action: DecisionAction,
    pub reason: String,
    pub runners: Vec<RunnerPriceSnapshot>,
    pub candidates: Vec<BetCandidate>,
    pub daily_pnl: Decimal,
    pub daily_exposure: Decimal,
    pub bets_today: usize,
    pub minutes_to_start: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl DecisionRecord {
    /// Build a record from a market context and evaluation outcome.
    #[allow(clippy::too_many_arguments)]
    pub fn from_context(
        ctx: &MarketContext,
        plugin_id: &str,
        action: DecisionAction,
        reason: String,
        candidates: Vec<BetCandidate>,
        daily_pnl: Decimal,
        daily_exposure: Decimal,
        bets_today: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let runners = ctx
            .runners
            .iter()
            .map(|r| RunnerPriceSnapshot {
                selection_id: r.selection_id,
                runner_name: r.runner_name.clone(),
                best_back: r.ladder.best_back().map(|l| l.price),
                best_lay: r.ladder.best_lay().map(|l| l.price),
                last_traded: r.ladder.last_traded,
            })
            .collect();

        Self {
            market_id: ctx.market_id.clone(),
            market_name: ctx.market_name.clone(),
            venue: ctx.venue.clone(),
            race_time: ctx.start_time,
            plugin_id: plugin_id.to_string(),
            action,
            reason,
            runners,
            candidates,
            daily_pnl,
            daily_exposure,
            bets_today,
            minutes_to_start: Some(ctx.minutes_to_start(now).max(0.0)),
            recorded_at: now,
        }
    }
}
