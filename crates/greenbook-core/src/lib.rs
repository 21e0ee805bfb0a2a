//! Core domain types for the greenbook lay-betting engine.
//!
//! This crate provides the fundamental types shared across the system:
//! - `Odds`, `Stake`: precision-safe numeric types
//! - `MarketSnapshot`, `RunnerLadder`: order-book state
//! - `Bet`, `BetCandidate`, `BetOutcome`: betting records
//! - `DecisionRecord`: the append-only audit trail entry
//! - `EngineMode`, `RiskSettings`: engine session state

pub mod bet;
pub mod decimal;
pub mod decision;
pub mod error;
pub mod market;
pub mod plugin;
pub mod session;

pub use bet::{
    Bet, BetCandidate, BetOutcome, BetSide, BetSource, BetStatus, Confidence, SettlementResult,
    Zone,
};
pub use decimal::{Odds, Stake};
pub use decision::{DecisionAction, DecisionRecord, RunnerPriceSnapshot};
pub use error::{CoreError, Result};
pub use market::{
    CatalogueEntry, MarketContext, MarketId, MarketSnapshot, MarketStatus, PriceLevel,
    RunnerContext, RunnerLadder, SelectionId, LADDER_DEPTH,
};
pub use plugin::PluginDescriptor;
pub use session::{EngineMode, RiskSettings, SessionRecord};
