//! Engine session state: mode, risk settings, daily counters.
//!
//! The session record is owned by the engine loop and persisted so that
//! mode and counters survive a process restart.

use crate::market::MarketId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Engine operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineMode {
    #[default]
    Stopped,
    /// Full decision pipeline, bets recorded locally only.
    Staging,
    /// Real order placement.
    Live,
    /// Loop keeps running but skips the scan body.
    Paused,
}

impl EngineMode {
    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, Self::Staging | Self::Live)
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "STOPPED"),
            Self::Staging => write!(f, "STAGING"),
            Self::Live => write!(f, "LIVE"),
            Self::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Risk-limit settings enforced by the engine each cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSettings {
    /// Per-bet liability cap.
    #[serde(default = "default_max_liability_per_bet")]
    pub max_liability_per_bet: Decimal,
    /// Cumulative open-liability cap for the day.
    #[serde(default = "default_max_daily_exposure")]
    pub max_daily_exposure: Decimal,
    /// Daily stop-loss threshold (negative).
    #[serde(default = "default_daily_stop_loss")]
    pub daily_stop_loss: Decimal,
    #[serde(default = "default_max_bets_per_race")]
    pub max_bets_per_race: usize,
    #[serde(default = "default_max_concurrent_bets")]
    pub max_concurrent_bets: usize,
    /// Only act when 0 <= minutes-to-start <= this window.
    #[serde(default = "default_pre_race_window_minutes")]
    pub pre_race_window_minutes: u32,
    /// Venue minimum stake; halved stakes clamp to this.
    #[serde(default = "default_min_stake")]
    pub min_stake: Decimal,
}

fn default_max_liability_per_bet() -> Decimal {
    Decimal::new(900, 2) // 9.00
}

fn default_max_daily_exposure() -> Decimal {
    Decimal::new(7500, 2) // 75.00
}

fn default_daily_stop_loss() -> Decimal {
    Decimal::new(-2500, 2) // -25.00
}

fn default_max_bets_per_race() -> usize {
    1
}

fn default_max_concurrent_bets() -> usize {
    10
}

fn default_pre_race_window_minutes() -> u32 {
    30
}

fn default_min_stake() -> Decimal {
    Decimal::new(100, 2) // 1.00
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_liability_per_bet: default_max_liability_per_bet(),
            max_daily_exposure: default_max_daily_exposure(),
            daily_stop_loss: default_daily_stop_loss(),
            max_bets_per_race: default_max_bets_per_race(),
            max_concurrent_bets: default_max_concurrent_bets(),
            pre_race_window_minutes: default_pre_race_window_minutes(),
            min_stake: default_min_stake(),
        }
    }
}

/// Persisted engine session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub mode: EngineMode,
    /// Mode to resume into after PAUSED.
    pub previous_mode: Option<EngineMode>,
    pub settings: RiskSettings,
    /// Markets already evaluated in the current mode.
    pub processed_markets: BTreeSet<MarketId>,
    pub daily_exposure: Decimal,
    pub daily_pnl: Decimal,
    pub bets_placed_today: usize,
    pub last_reset_date: NaiveDate,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            mode: EngineMode::Stopped,
            previous_mode: None,
            settings: RiskSettings::default(),
            processed_markets: BTreeSet::new(),
            daily_exposure: Decimal::ZERO,
            daily_pnl: Decimal::ZERO,
            bets_placed_today: 0,
            last_reset_date: NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = RiskSettings::default();
        assert_eq!(s.max_liability_per_bet, Decimal::new(900, 2));
        assert_eq!(s.daily_stop_loss, Decimal::new(-2500, 2));
        assert_eq!(s.pre_race_window_minutes, 30);
    }

    #[test]
    fn test_mode_predicates() {
        assert!(!EngineMode::Stopped.is_running());
        assert!(EngineMode::Paused.is_running());
        assert!(!EngineMode::Paused.is_scanning());
        assert!(EngineMode::Live.is_scanning());
    }
}
