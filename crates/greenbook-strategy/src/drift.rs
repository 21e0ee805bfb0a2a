//! Odds drift monitor.
//!
//! Watches how a laid runner's price moves between scan cycles and logs
//! significant movement. Monitoring only: it never cancels or amends
//! orders, it just leaves an audit trail of adverse drift.

use dashmap::DashMap;
use greenbook_core::{MarketId, Odds, SelectionId};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Relative move (fraction of the reference price) that triggers a log.
const DEFAULT_DRIFT_THRESHOLD: Decimal = Decimal::from_parts(15, 0, 0, false, 2); // 0.15

pub struct DriftMonitor {
    /// Reference odds at the time the bet was recorded.
    watched: DashMap<(MarketId, SelectionId), Odds>,
    threshold: Decimal,
}

impl DriftMonitor {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_DRIFT_THRESHOLD)
    }

    pub fn with_threshold(threshold: Decimal) -> Self {
        Self {
            watched: DashMap::new(),
            threshold,
        }
    }

    /// Start watching a runner at its bet price.
    pub fn watch(&self, market_id: MarketId, selection_id: SelectionId, reference: Odds) {
        self.watched.insert((market_id, selection_id), reference);
    }

    pub fn unwatch(&self, market_id: &MarketId, selection_id: SelectionId) {
        self.watched.remove(&(market_id.clone(), selection_id));
    }

    /// Drop every watched runner; their races are settled or abandoned.
    pub fn clear(&self) {
        self.watched.clear();
    }

    /// Compare the current price against the reference. Returns true
    /// when drift beyond the threshold was observed (and logged).
    pub fn observe(&self, market_id: &MarketId, selection_id: SelectionId, current: Odds) -> bool {
        let key = (market_id.clone(), selection_id);
        let Some(reference) = self.watched.get(&key).map(|r| *r) else {
            return false;
        };
        if reference.is_zero() {
            return false;
        }

        let delta = current.inner() - reference.inner();
        let relative = (delta / reference.inner()).abs();
        if relative >= self.threshold {
            warn!(
                %market_id,
                %selection_id,
                reference = %reference,
                current = %current,
                drift_pct = %(relative * Decimal::ONE_HUNDRED).round_dp(1),
                "Odds drift beyond threshold"
            );
            true
        } else {
            info!(
                %market_id,
                %selection_id,
                reference = %reference,
                current = %current,
                "Odds within drift tolerance"
            );
            false
        }
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }
}

impl Default for DriftMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_drift_beyond_threshold_flagged() {
        let monitor = DriftMonitor::new();
        let market = MarketId::new("1.1");
        monitor.watch(market.clone(), SelectionId(5), Odds::new(dec!(3.50)));

        // 3.50 -> 4.20 is a 20% drift.
        assert!(monitor.observe(&market, SelectionId(5), Odds::new(dec!(4.20))));
        // 3.50 -> 3.60 is under 15%.
        assert!(!monitor.observe(&market, SelectionId(5), Odds::new(dec!(3.60))));
    }

    #[test]
    fn test_unwatched_runner_ignored() {
        let monitor = DriftMonitor::new();
        assert!(!monitor.observe(&MarketId::new("1.1"), SelectionId(5), Odds::new(dec!(9.0))));
    }

    #[test]
    fn test_unwatch() {
        let monitor = DriftMonitor::new();
        let market = MarketId::new("1.1");
        monitor.watch(market.clone(), SelectionId(5), Odds::new(dec!(3.50)));
        monitor.unwatch(&market, SelectionId(5));
        assert_eq!(monitor.watched_count(), 0);
    }

    #[test]
    fn test_clear() {
        let monitor = DriftMonitor::new();
        monitor.watch(MarketId::new("1.1"), SelectionId(5), Odds::new(dec!(3.50)));
        monitor.watch(MarketId::new("1.2"), SelectionId(7), Odds::new(dec!(4.10)));
        monitor.clear();
        assert_eq!(monitor.watched_count(), 0);
        assert!(!monitor.observe(&MarketId::new("1.1"), SelectionId(5), Odds::new(dec!(9.0))));
    }
}
