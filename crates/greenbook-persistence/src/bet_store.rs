//! Bet store.
//!
//! Bets live in memory and are rewritten to one JSON file on every
//! mutation (the population is small: one process, tens of bets a day).
//! The file is replaced via a temp-file rename so a crash mid-write
//! leaves the previous generation intact.

use crate::error::PersistenceResult;
use chrono::{NaiveDate, Utc};
use greenbook_core::{Bet, BetStatus, MarketId, SettlementResult};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Aggregates over one day's bets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyStats {
    pub bets_placed: usize,
    pub open_liability: Decimal,
    pub realized_pnl: Decimal,
}

pub struct BetStore {
    path: Option<PathBuf>,
    bets: RwLock<HashMap<Uuid, Bet>>,
}

impl BetStore {
    /// File-backed store; loads any existing bets from `path`.
    pub fn open(path: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let path: PathBuf = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bets = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            let list: Vec<Bet> = serde_json::from_str(&data)?;
            info!(bets = list.len(), file = %path.display(), "Loaded bet store");
            list.into_iter().map(|b| (b.id, b)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: Some(path),
            bets: RwLock::new(bets),
        })
    }

    /// Memory-only store for tests.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            bets: RwLock::new(HashMap::new()),
        }
    }

    fn persist(&self, bets: &HashMap<Uuid, Bet>) -> PersistenceResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut list: Vec<&Bet> = bets.values().collect();
        list.sort_by_key(|b| b.placed_at);
        let json = serde_json::to_string_pretty(&list)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!(bets = list.len(), "Persisted bet store");
        Ok(())
    }

    pub fn insert(&self, bet: Bet) -> PersistenceResult<()> {
        let mut bets = self.bets.write();
        bets.insert(bet.id, bet);
        self.persist(&bets)
    }

    pub fn get(&self, id: &Uuid) -> Option<Bet> {
        self.bets.read().get(id).cloned()
    }

    pub fn find_by_reference(&self, external_reference: &str) -> Option<Bet> {
        self.bets
            .read()
            .values()
            .find(|b| b.external_reference.as_deref() == Some(external_reference))
            .cloned()
    }

    /// All bets, newest placement first.
    pub fn all(&self) -> Vec<Bet> {
        let mut list: Vec<Bet> = self.bets.read().values().cloned().collect();
        list.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        list
    }

    /// Duplicate rule: does any bet block this market?
    ///
    /// Cancelled and errored bets never block. Staged bets are excluded
    /// when `exclude_staged` is set (LIVE mode).
    pub fn has_bet_on_market(&self, market_id: &MarketId, exclude_staged: bool) -> bool {
        self.bets
            .read()
            .values()
            .any(|b| &b.market_id == market_id && b.blocks_market(exclude_staged))
    }

    /// Bets that count against the per-race cap.
    pub fn bets_on_market(&self, market_id: &MarketId, exclude_staged: bool) -> usize {
        self.bets
            .read()
            .values()
            .filter(|b| &b.market_id == market_id && b.blocks_market(exclude_staged))
            .count()
    }

    /// Unsettled, uncancelled bet count (concurrency cap).
    pub fn open_bet_count(&self) -> usize {
        self.bets
            .read()
            .values()
            .filter(|b| b.result.is_none() && !matches!(b.status, BetStatus::Cancelled | BetStatus::Error))
            .count()
    }

    /// Aggregates for bets placed on the given date.
    pub fn daily_stats(&self, date: NaiveDate) -> DailyStats {
        let bets = self.bets.read();
        let mut stats = DailyStats::default();
        for bet in bets.values() {
            if bet.placed_at.date_naive() != date {
                continue;
            }
            if !matches!(bet.status, BetStatus::Cancelled | BetStatus::Error) {
                stats.bets_placed += 1;
            }
            stats.open_liability += bet.open_liability();
            if bet.result.is_some() {
                stats.realized_pnl += bet.profit_loss;
            }
        }
        stats
    }

    /// Settlement reconciliation hook: apply a matched-size update from
    /// the order feed, keyed by the exchange reference.
    pub fn apply_order_update(
        &self,
        external_reference: &str,
        size_matched: Decimal,
        size_remaining: Decimal,
        average_price: Option<Decimal>,
    ) -> PersistenceResult<bool> {
        let mut bets = self.bets.write();
        let Some(bet) = bets
            .values_mut()
            .find(|b| b.external_reference.as_deref() == Some(external_reference))
        else {
            return Ok(false);
        };

        bet.size_matched = size_matched;
        bet.size_remaining = size_remaining;
        if let Some(avg) = average_price {
            if !avg.is_zero() {
                bet.odds = greenbook_core::Odds::new(avg);
                bet.liability = bet.stake.liability(bet.odds);
            }
        }
        if !size_matched.is_zero() && bet.status == BetStatus::Pending {
            bet.status = BetStatus::Matched;
            bet.matched_at = Some(Utc::now());
            debug!(reference = %external_reference, %size_matched, "Bet matched");
        }

        self.persist(&bets)?;
        Ok(true)
    }

    /// Settlement hook: record the final result and realized P/L.
    pub fn settle(
        &self,
        external_reference: &str,
        result: SettlementResult,
        profit_loss: Decimal,
    ) -> PersistenceResult<bool> {
        let mut bets = self.bets.write();
        let Some(bet) = bets
            .values_mut()
            .find(|b| b.external_reference.as_deref() == Some(external_reference))
        else {
            warn!(reference = %external_reference, "Settlement for unknown bet");
            return Ok(false);
        };

        bet.result = Some(result);
        bet.profit_loss = profit_loss;
        bet.settled_at = Some(Utc::now());
        info!(
            reference = %external_reference,
            ?result,
            %profit_loss,
            "Bet settled"
        );

        self.persist(&bets)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenbook_core::{
        BetSide, BetSource, Confidence, Odds, SelectionId, Stake, Zone,
    };
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn bet(market: &str, source: BetSource, reference: Option<&str>) -> Bet {
        Bet {
            id: Uuid::new_v4(),
            external_reference: reference.map(str::to_string),
            market_id: MarketId::new(market),
            market_name: "2m Hcap".into(),
            venue: "Kempton".into(),
            race_time: Utc::now(),
            selection_id: SelectionId(5),
            runner_name: "Runner".into(),
            side: BetSide::Lay,
            odds: Odds::new(dec!(3.75)),
            stake: Stake::new(dec!(3.00)),
            liability: dec!(8.25),
            zone: Zone::Prime,
            confidence: Confidence::High,
            plugin_id: "tiered_lay_v1".into(),
            source,
            status: BetStatus::Pending,
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
    fn test_duplicate_rule_staged_exclusion() {
        let store = BetStore::in_memory();
        store.insert(bet("1.1", BetSource::Staged, None)).unwrap();

        // LIVE mode ignores staged bets; STAGING counts them.
        assert!(!store.has_bet_on_market(&MarketId::new("1.1"), true));
        assert!(store.has_bet_on_market(&MarketId::new("1.1"), false));
        assert!(!store.has_bet_on_market(&MarketId::new("1.2"), false));
    }

    #[test]
    fn test_daily_stats() {
        let store = BetStore::in_memory();
        store
            .insert(bet("1.1", BetSource::Auto, Some("b-1")))
            .unwrap();
        store
            .insert(bet("1.2", BetSource::Auto, Some("b-2")))
            .unwrap();

        let today = Utc::now().date_naive();
        let stats = store.daily_stats(today);
        assert_eq!(stats.bets_placed, 2);
        assert_eq!(stats.open_liability, dec!(16.50));
        assert_eq!(stats.realized_pnl, Decimal::ZERO);

        store
            .settle("b-1", SettlementResult::Won, dec!(3.00))
            .unwrap();
        let stats = store.daily_stats(today);
        assert_eq!(stats.open_liability, dec!(8.25));
        assert_eq!(stats.realized_pnl, dec!(3.00));
    }

    #[test]
    fn test_order_update_marks_matched() {
        let store = BetStore::in_memory();
        store
            .insert(bet("1.1", BetSource::Auto, Some("b-1")))
            .unwrap();

        let applied = store
            .apply_order_update("b-1", dec!(3.00), Decimal::ZERO, Some(dec!(3.80)))
            .unwrap();
        assert!(applied);

        let stored = store.all().pop().unwrap();
        assert_eq!(stored.status, BetStatus::Matched);
        assert_eq!(stored.odds, Odds::new(dec!(3.80)));
        assert_eq!(stored.liability, dec!(8.40));
        assert!(stored.matched_at.is_some());

        assert!(!store
            .apply_order_update("missing", dec!(1), Decimal::ZERO, None)
            .unwrap());
    }

    #[test]
    fn test_reload_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bets.json");
        let id;
        {
            let store = BetStore::open(&path).unwrap();
            let b = bet("1.1", BetSource::Auto, Some("b-1"));
            id = b.id;
            store.insert(b).unwrap();
        }
        let reloaded = BetStore::open(&path).unwrap();
        assert!(reloaded.get(&id).is_some());
        assert!(reloaded.has_bet_on_market(&MarketId::new("1.1"), true));
    }
}
