//! Bet records, candidates, and execution outcomes.

use crate::decimal::{Odds, Stake};
use crate::market::{MarketId, SelectionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Odds-band classification used for stake tiering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Zone {
    /// Highest-priority band.
    Prime,
    Strong,
    Secondary,
}

impl Zone {
    /// Selection order when multiple runners qualify in one race.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Prime => 0,
            Self::Strong => 1,
            Self::Secondary => 2,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Self::Prime => Confidence::High,
            Self::Strong => Confidence::MediumHigh,
            Self::Secondary => Confidence::Medium,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prime => write!(f, "PRIME"),
            Self::Strong => write!(f, "STRONG"),
            Self::Secondary => write!(f, "SECONDARY"),
        }
    }
}

/// Human-readable confidence label attached to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    MediumHigh,
    Medium,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::MediumHigh => write!(f, "MEDIUM-HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// Bet side. The reference strategy only lays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetSide {
    Back,
    Lay,
}

/// How a bet record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetSource {
    Auto,
    Manual,
    Staged,
}

/// Bet lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetStatus {
    /// Accepted by the exchange, not fully matched.
    Pending,
    Matched,
    Cancelled,
    /// Placement was rejected or errored.
    Error,
}

/// Settlement result, filled in by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementResult {
    Won,
    Lost,
    Void,
}

/// A candidate bet proposed by a strategy plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetCandidate {
    pub market_id: MarketId,
    pub selection_id: SelectionId,
    pub runner_name: String,
    pub odds: Odds,
    pub stake: Stake,
    /// stake * (odds - 1)
    pub liability: Decimal,
    pub zone: Zone,
    pub confidence: Confidence,
    pub reason: String,
}

/// Result of handing a candidate to an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetOutcome {
    pub success: bool,
    /// Exchange bet reference, or a local staging reference.
    pub external_reference: Option<String>,
    pub error: Option<String>,
}

impl BetOutcome {
    pub fn success(reference: impl Into<String>) -> Self {
        Self {
            success: true,
            external_reference: Some(reference.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            external_reference: None,
            error: Some(error.into()),
        }
    }
}

/// Persisted record of a candidate that was acted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    /// Exchange bet reference (None for staged or failed placements).
    pub external_reference: Option<String>,
    pub market_id: MarketId,
    pub market_name: String,
    pub venue: String,
    pub race_time: DateTime<Utc>,
    pub selection_id: SelectionId,
    pub runner_name: String,
    pub side: BetSide,
    pub odds: Odds,
    pub stake: Stake,
    pub liability: Decimal,
    pub zone: Zone,
    pub confidence: Confidence,
    pub plugin_id: String,
    pub source: BetSource,
    pub status: BetStatus,
    pub size_matched: Decimal,
    pub size_remaining: Decimal,
    pub result: Option<SettlementResult>,
    pub profit_loss: Decimal,
    pub error: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Bet {
    /// Open liability still at risk (settled or cancelled bets carry none).
    pub fn open_liability(&self) -> Decimal {
        if self.result.is_some() || matches!(self.status, BetStatus::Cancelled | BetStatus::Error) {
            Decimal::ZERO
        } else {
            self.liability
        }
    }

    /// Whether this bet counts toward the duplicate check in the given mode.
    ///
    /// In LIVE mode staged bets are excluded; in STAGING every bet counts.
    pub fn blocks_market(&self, exclude_staged: bool) -> bool {
        if self.status == BetStatus::Cancelled || self.status == BetStatus::Error {
            return false;
        }
        !(exclude_staged && self.source == BetSource::Staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bet(source: BetSource, status: BetStatus) -> Bet {
        Bet {
            id: Uuid::new_v4(),
            external_reference: None,
            market_id: MarketId::new("1.1"),
            market_name: "2m Hcap".into(),
            venue: "Kempton".into(),
            race_time: Utc::now(),
            selection_id: SelectionId(101),
            runner_name: "Runner".into(),
            side: BetSide::Lay,
            odds: Odds::new(dec!(3.75)),
            stake: Stake::new(dec!(3.00)),
            liability: dec!(8.25),
            zone: Zone::Prime,
            confidence: Confidence::High,
            plugin_id: "tiered_lay".into(),
            source,
            status,
            size_matched: Decimal::ZERO,
            size_remaining: dec!(3.00),
            result: None,
            profit_loss: Decimal::ZERO,
            error: None,
            placed_at: Utc::now(),
            matched_at: None,
            settled_at: None,
        }
    }

    #[test]
    fn test_staged_bet_excluded_in_live_mode() {
        let staged = bet(BetSource::Staged, BetStatus::Pending);
        assert!(!staged.blocks_market(true));
        assert!(staged.blocks_market(false));
    }

    #[test]
    fn test_cancelled_bet_never_blocks() {
        let cancelled = bet(BetSource::Auto, BetStatus::Cancelled);
        assert!(!cancelled.blocks_market(false));
    }

    #[test]
    fn test_open_liability_drops_after_settlement() {
        let mut b = bet(BetSource::Auto, BetStatus::Matched);
        assert_eq!(b.open_liability(), dec!(8.25));
        b.result = Some(SettlementResult::Won);
        assert_eq!(b.open_liability(), Decimal::ZERO);
    }
}
