//! Status snapshot served by the control surface.

use chrono::{DateTime, NaiveDate, Utc};
use greenbook_core::{EngineMode, RiskSettings};
use rust_decimal::Decimal;
use serde::Serialize;

/// Counters accumulated since process start.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineCounters {
    pub scans: u64,
    pub evaluations: u64,
    pub bets_placed: u64,
    pub errors: u64,
    pub last_scan: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub mode: EngineMode,
    pub previous_mode: Option<EngineMode>,
    pub daily_exposure: Decimal,
    pub daily_pnl: Decimal,
    pub bets_placed_today: usize,
    pub processed_markets: usize,
    pub tracked_markets: usize,
    pub stop_loss_hit: bool,
    pub last_reset_date: NaiveDate,
    pub settings: RiskSettings,
    pub counters: EngineCounters,
}
