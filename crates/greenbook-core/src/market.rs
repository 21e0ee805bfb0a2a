//! Market data types: snapshots, ladders, catalogue metadata.
//!
//! A `MarketSnapshot` is owned by the price state store and replaced
//! atomically per update; readers get clones and never observe a
//! partially-applied merge.

use crate::decimal::Odds;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ladder depth kept per side (best price first).
pub const LADDER_DEPTH: usize = 3;

/// Exchange market identifier (e.g. "1.234567890").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(pub String);

impl MarketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Runner (selection) identifier within a market.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SelectionId(pub i64);

impl fmt::Display for SelectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Market lifecycle status as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatus {
    #[default]
    Open,
    Inactive,
    Suspended,
    Closed,
}

impl MarketStatus {
    /// Only OPEN markets are eligible for evaluation.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Inactive => write!(f, "INACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// One price level on a ladder side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Odds,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Odds, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Per-runner order-book ladder.
///
/// Both sides hold up to [`LADDER_DEPTH`] levels, best price first:
/// available-to-back descending by price, available-to-lay ascending.
/// A size of zero never survives a merge; it means "remove this level".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerLadder {
    pub available_to_back: Vec<PriceLevel>,
    pub available_to_lay: Vec<PriceLevel>,
    pub last_traded: Option<Odds>,
    pub total_matched: Decimal,
}

impl RunnerLadder {
    /// Best available-to-back level (highest price).
    pub fn best_back(&self) -> Option<&PriceLevel> {
        self.available_to_back.first()
    }

    /// Best available-to-lay level (lowest price).
    pub fn best_lay(&self) -> Option<&PriceLevel> {
        self.available_to_lay.first()
    }

    /// Lay odds for strategy evaluation: best available-to-lay,
    /// falling back to last-traded when the lay side is empty.
    pub fn lay_odds(&self) -> Option<Odds> {
        self.best_lay().map(|l| l.price).or(self.last_traded)
    }
}

/// Point-in-time consistent view of one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_id: MarketId,
    pub status: MarketStatus,
    pub in_play: bool,
    /// Scheduled start time, when the feed has delivered a definition.
    pub start_time: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    pub total_matched: Decimal,
    pub runners: BTreeMap<SelectionId, RunnerLadder>,
}

impl MarketSnapshot {
    pub fn new(market_id: MarketId) -> Self {
        Self {
            market_id,
            status: MarketStatus::Open,
            in_play: false,
            start_time: None,
            last_update: Utc::now(),
            total_matched: Decimal::ZERO,
            runners: BTreeMap::new(),
        }
    }
}

/// Slow-changing metadata the feed omits, refreshed from the account API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub market_id: MarketId,
    pub market_name: String,
    pub venue: String,
    pub country_code: String,
    pub start_time: DateTime<Utc>,
    pub runner_names: BTreeMap<SelectionId, String>,
}

/// One runner with live prices and joined metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerContext {
    pub selection_id: SelectionId,
    pub runner_name: String,
    pub ladder: RunnerLadder,
}

/// Full market context handed to the plugin pipeline: a price snapshot
/// joined with catalogue metadata at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub market_id: MarketId,
    pub market_name: String,
    pub venue: String,
    pub status: MarketStatus,
    pub in_play: bool,
    pub start_time: DateTime<Utc>,
    pub runners: Vec<RunnerContext>,
}

impl MarketContext {
    /// Minutes until scheduled start; negative once the race is off.
    pub fn minutes_to_start(&self, now: DateTime<Utc>) -> f64 {
        (self.start_time - now).num_seconds() as f64 / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lay_odds_prefers_ladder_over_ltp() {
        let ladder = RunnerLadder {
            available_to_lay: vec![PriceLevel::new(Odds::new(dec!(3.50)), dec!(20))],
            last_traded: Some(Odds::new(dec!(3.45))),
            ..Default::default()
        };
        assert_eq!(ladder.lay_odds(), Some(Odds::new(dec!(3.50))));
    }

    #[test]
    fn test_lay_odds_falls_back_to_ltp() {
        let ladder = RunnerLadder {
            last_traded: Some(Odds::new(dec!(3.45))),
            ..Default::default()
        };
        assert_eq!(ladder.lay_odds(), Some(Odds::new(dec!(3.45))));
    }

    #[test]
    fn test_minutes_to_start() {
        let now = Utc::now();
        let ctx = MarketContext {
            market_id: MarketId::new("1.1"),
            market_name: "Test".into(),
            venue: "Ascot".into(),
            status: MarketStatus::Open,
            in_play: false,
            start_time: now + chrono::Duration::minutes(25),
            runners: vec![],
        };
        let mins = ctx.minutes_to_start(now);
        assert!((mins - 25.0).abs() < 0.01);
    }
}
