//! Catalogue cache with periodic refresh.
//!
//! Entries survive a failed refresh: a dead account API must not blind
//! the engine to races it already knows about. Refresh is driven by the
//! caller's cadence; the cache itself only tracks staleness.

use crate::client::CatalogueApi;
use crate::error::CatalogueResult;
use dashmap::DashMap;
use greenbook_core::{CatalogueEntry, MarketId};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default interval between catalogue refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

pub struct CatalogueCache {
    entries: DashMap<MarketId, CatalogueEntry>,
    refresh_interval: Duration,
    last_refresh: Mutex<Option<Instant>>,
}

impl CatalogueCache {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            refresh_interval,
            last_refresh: Mutex::new(None),
        }
    }

    /// True when the cache has never refreshed or the interval elapsed.
    pub fn is_due(&self) -> bool {
        self.last_refresh
            .lock()
            .map(|t| t.elapsed() >= self.refresh_interval)
            .unwrap_or(true)
    }

    /// Refresh from the account API if the interval has elapsed.
    ///
    /// On failure the existing entries are kept and served stale.
    pub async fn refresh_if_due(&self, api: &dyn CatalogueApi) -> CatalogueResult<bool> {
        if !self.is_due() {
            return Ok(false);
        }
        match self.refresh(api).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(%e, entries = self.entries.len(), "Catalogue refresh failed, serving stale entries");
                Err(e)
            }
        }
    }

    /// Unconditional refresh.
    pub async fn refresh(&self, api: &dyn CatalogueApi) -> CatalogueResult<()> {
        let fetched = api.list_market_catalogue().await?;
        for entry in fetched {
            self.entries.insert(entry.market_id.clone(), entry);
        }
        *self.last_refresh.lock() = Some(Instant::now());
        info!(entries = self.entries.len(), "Catalogue cache refreshed");
        Ok(())
    }

    pub fn get(&self, market_id: &MarketId) -> Option<CatalogueEntry> {
        self.entries.get(market_id).map(|e| e.clone())
    }

    pub fn market_ids(&self) -> Vec<MarketId> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CatalogueCache {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockCatalogueApi;
    use crate::error::CatalogueError;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn entry(id: &str, venue: &str) -> CatalogueEntry {
        CatalogueEntry {
            market_id: MarketId::new(id),
            market_name: "2m Hcap".into(),
            venue: venue.into(),
            country_code: "GB".into(),
            start_time: Utc::now(),
            runner_names: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_refresh_populates_cache() {
        let mut api = MockCatalogueApi::new();
        api.expect_list_market_catalogue()
            .returning(|| Ok(vec![entry("1.1", "Ascot"), entry("1.2", "Bath")]));

        let cache = CatalogueCache::default();
        cache.refresh(&api).await.expect("refresh");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&MarketId::new("1.1")).unwrap().venue, "Ascot");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entries() {
        let mut api = MockCatalogueApi::new();
        api.expect_list_market_catalogue()
            .times(1)
            .returning(|| Ok(vec![entry("1.1", "Ascot")]));

        let cache = CatalogueCache::new(Duration::ZERO);
        cache.refresh(&api).await.expect("first refresh");

        let mut failing = MockCatalogueApi::new();
        failing
            .expect_list_market_catalogue()
            .returning(|| Err(CatalogueError::HttpClient("timeout".into())));

        assert!(cache.refresh_if_due(&failing).await.is_err());
        // Stale entry still served.
        assert!(cache.get(&MarketId::new("1.1")).is_some());
    }

    #[tokio::test]
    async fn test_refresh_if_due_respects_interval() {
        let mut api = MockCatalogueApi::new();
        api.expect_list_market_catalogue()
            .times(1)
            .returning(|| Ok(vec![]));

        let cache = CatalogueCache::new(Duration::from_secs(3600));
        assert!(cache.refresh_if_due(&api).await.expect("refresh"));
        // Within the interval: no second fetch.
        assert!(!cache.refresh_if_due(&api).await.expect("skip"));
    }
}
