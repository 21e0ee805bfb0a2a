//! Per-market price state.
//!
//! Each market holds a [`MarketSnapshot`] behind its own lock inside a
//! concurrent map. Stream deltas are merged in place; an image change
//! discards prior ladder state for that market first. Readers always
//! get clones.

use chrono::Utc;
use dashmap::DashMap;
use greenbook_core::{
    MarketId, MarketSnapshot, MarketStatus, Odds, PriceLevel, RunnerLadder, LADDER_DEPTH,
};
use greenbook_stream::{MarketChange, RunnerChange};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

type MarketEntry = Arc<RwLock<MarketSnapshot>>;

/// Concurrent store of reconstructed market books.
pub struct PriceCache {
    markets: DashMap<MarketId, MarketEntry>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            markets: DashMap::new(),
        }
    }

    fn get_or_create(&self, market_id: &MarketId) -> MarketEntry {
        self.markets
            .entry(market_id.clone())
            .or_insert_with(|| Arc::new(RwLock::new(MarketSnapshot::new(market_id.clone()))))
            .clone()
    }

    /// Apply one per-market change from an `mcm` frame.
    ///
    /// Unknown markets are created on first sight. A change with no
    /// runner deltas, definition, or volume still refreshes the
    /// market's last-update time.
    pub fn apply_market_change(&self, change: &MarketChange) {
        let entry = self.get_or_create(&change.id);
        let mut snapshot = entry.write();

        if change.img {
            debug!(market_id = %change.id, "Applying full image");
            let fresh = MarketSnapshot::new(change.id.clone());
            *snapshot = fresh;
        }

        if let Some(def) = &change.market_definition {
            snapshot.status = def.status;
            snapshot.in_play = def.in_play;
            if def.market_time.is_some() {
                snapshot.start_time = def.market_time;
            }
        }

        if let Some(tv) = change.tv {
            snapshot.total_matched = tv;
        }

        for rc in &change.rc {
            let ladder = snapshot.runners.entry(rc.id).or_default();
            merge_runner_change(ladder, rc);
        }

        snapshot.last_update = Utc::now();
    }

    /// Current snapshot for one market.
    pub fn snapshot(&self, market_id: &MarketId) -> Option<MarketSnapshot> {
        self.markets.get(market_id).map(|e| e.read().clone())
    }

    /// Snapshots of every tracked market.
    pub fn all_snapshots(&self) -> Vec<MarketSnapshot> {
        self.markets.iter().map(|e| e.read().clone()).collect()
    }

    /// Ids of every tracked market.
    pub fn market_ids(&self) -> Vec<MarketId> {
        self.markets.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Drop markets the feed has marked CLOSED. Returns how many were
    /// removed.
    pub fn prune_closed(&self) -> usize {
        let before = self.markets.len();
        self.markets
            .retain(|_, entry| entry.read().status != MarketStatus::Closed);
        before - self.markets.len()
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge one runner's deltas into its ladder.
fn merge_runner_change(ladder: &mut RunnerLadder, rc: &RunnerChange) {
    // Available-to-back: best price is the highest.
    merge_levels(&mut ladder.available_to_back, &rc.atb, SortSide::Back);
    // Available-to-lay: best price is the lowest.
    merge_levels(&mut ladder.available_to_lay, &rc.atl, SortSide::Lay);

    if let Some(ltp) = rc.ltp {
        ladder.last_traded = Some(Odds::new(ltp));
    }
    if let Some(tv) = rc.tv {
        ladder.total_matched = tv;
    }
}

#[derive(Clone, Copy)]
enum SortSide {
    Back,
    Lay,
}

/// Merge `[price, size]` deltas into an existing ladder side.
///
/// Matching price replaces the level, size zero removes it, new prices
/// insert. The side is re-sorted best-first and truncated to depth.
fn merge_levels(levels: &mut Vec<PriceLevel>, deltas: &[(Decimal, Decimal)], side: SortSide) {
    if deltas.is_empty() {
        return;
    }

    for &(price, size) in deltas {
        let pos = levels.iter().position(|l| l.price.inner() == price);
        if size.is_zero() {
            if let Some(idx) = pos {
                levels.remove(idx);
            }
        } else {
            match pos {
                Some(idx) => levels[idx].size = size,
                None => levels.push(PriceLevel::new(Odds::new(price), size)),
            }
        }
    }

    match side {
        SortSide::Back => levels.sort_by(|a, b| b.price.inner().cmp(&a.price.inner())),
        SortSide::Lay => levels.sort_by(|a, b| a.price.inner().cmp(&b.price.inner())),
    }
    levels.truncate(LADDER_DEPTH);
}
