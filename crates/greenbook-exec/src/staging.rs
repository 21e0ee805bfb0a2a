//! Staging recorder.
//!
//! Runs the full decision pipeline without touching the exchange. Every
//! candidate "succeeds" with a locally minted reference so downstream
//! bookkeeping is identical to a live placement.

use crate::executor::BetExecutor;
use async_trait::async_trait;
use greenbook_core::{BetCandidate, BetOutcome, BetSource};
use tracing::info;
use uuid::Uuid;

pub struct StagingRecorder;

impl StagingRecorder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StagingRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BetExecutor for StagingRecorder {
    fn source(&self) -> BetSource {
        BetSource::Staged
    }

    async fn execute(&self, candidate: &BetCandidate) -> BetOutcome {
        let reference = format!("staged-{}", Uuid::new_v4());
        info!(
            market_id = %candidate.market_id,
            runner = %candidate.runner_name,
            odds = %candidate.odds,
            stake = %candidate.stake,
            %reference,
            "Staged lay bet"
        );
        BetOutcome::success(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenbook_core::{Confidence, MarketId, Odds, SelectionId, Stake, Zone};
    use rust_decimal_macros::dec;

    fn candidate() -> BetCandidate {
        BetCandidate {
            market_id: MarketId::new("1.1"),
            selection_id: SelectionId(5),
            runner_name: "Runner".into(),
            odds: Odds::new(dec!(3.75)),
            stake: Stake::new(dec!(3.00)),
            liability: dec!(8.25),
            zone: Zone::Prime,
            confidence: Confidence::High,
            reason: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_staging_always_succeeds() {
        let recorder = StagingRecorder::new();
        let outcome = recorder.execute(&candidate()).await;
        assert!(outcome.success);
        assert!(outcome
            .external_reference
            .as_deref()
            .unwrap()
            .starts_with("staged-"));
        assert_eq!(recorder.source(), BetSource::Staged);
    }
}
