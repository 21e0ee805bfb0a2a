//! Execution contract.

use async_trait::async_trait;
use greenbook_core::{BetCandidate, BetOutcome, BetSource};

/// One attempt to act on a candidate.
///
/// Implementations never panic and never retry; the outcome carries
/// success or a human-readable error for the bet record.
#[async_trait]
pub trait BetExecutor: Send + Sync {
    /// Source tag recorded on the resulting bet.
    fn source(&self) -> BetSource;

    async fn execute(&self, candidate: &BetCandidate) -> BetOutcome;
}
