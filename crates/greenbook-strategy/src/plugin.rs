//! Strategy plugin contract.

use chrono::{DateTime, Utc};
use greenbook_core::{BetCandidate, DecisionAction, MarketContext, PluginDescriptor, RiskSettings};
use rust_decimal::Decimal;

/// Everything a plugin may consider. Passed by reference; plugins hold
/// no mutable state of their own.
#[derive(Debug, Clone)]
pub struct EvaluationInput<'a> {
    pub market: &'a MarketContext,
    pub daily_pnl: Decimal,
    pub daily_exposure: Decimal,
    pub bets_today: usize,
    pub settings: &'a RiskSettings,
    /// Evaluation wall-clock, injected for deterministic replay.
    pub now: DateTime<Utc>,
}

/// One plugin's verdict for one market.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub action: DecisionAction,
    pub candidates: Vec<BetCandidate>,
    pub reason: String,
}

impl Evaluation {
    pub fn accept(candidates: Vec<BetCandidate>, reason: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Accept,
            candidates,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Reject,
            candidates: Vec::new(),
            reason: reason.into(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Skip,
            candidates: Vec::new(),
            reason: reason.into(),
        }
    }

    /// An ACCEPT only counts when it actually proposes something.
    pub fn is_winning_accept(&self) -> bool {
        self.action == DecisionAction::Accept && !self.candidates.is_empty()
    }
}

/// A betting strategy evaluated by the pipeline each scan cycle.
pub trait StrategyPlugin: Send + Sync {
    /// Default descriptor used when the store has none persisted.
    fn default_descriptor(&self) -> PluginDescriptor;

    /// Evaluate one market. Must be a pure function of the input and
    /// the descriptor's configuration blob.
    fn evaluate(&self, input: &EvaluationInput<'_>, config: &serde_json::Value) -> Evaluation;
}
