//! REST client for the account API.
//!
//! Fetches market catalogue metadata and one-off book snapshots. Every
//! request carries the application key and session token headers; a 401
//! or INVALID_SESSION reply is surfaced as a distinct error so the
//! caller can halt instead of hammering the endpoint.

use crate::error::{CatalogueError, CatalogueResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenbook_core::{
    CatalogueEntry, MarketId, MarketSnapshot, MarketStatus, Odds, PriceLevel, RunnerLadder,
    SelectionId,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for account API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Markets fetched per catalogue request.
const MAX_CATALOGUE_RESULTS: u32 = 200;

/// Read-side account API surface, mockable for engine tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogueApi: Send + Sync {
    /// Fetch catalogue metadata for upcoming markets.
    async fn list_market_catalogue(&self) -> CatalogueResult<Vec<CatalogueEntry>>;

    /// Fetch a current book snapshot for specific markets.
    async fn list_market_book(
        &self,
        market_ids: &[MarketId],
    ) -> CatalogueResult<Vec<MarketSnapshot>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogueRequest {
    filter: CatalogueFilter,
    market_projection: Vec<String>,
    sort: String,
    max_results: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogueFilter {
    event_type_ids: Vec<String>,
    market_countries: Vec<String>,
    market_type_codes: Vec<String>,
    market_start_time: TimeRange,
}

#[derive(Debug, Serialize)]
struct TimeRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookRequest {
    market_ids: Vec<MarketId>,
    price_projection: PriceProjection,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceProjection {
    price_data: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalogueEntry {
    market_id: MarketId,
    market_name: String,
    market_start_time: DateTime<Utc>,
    #[serde(default)]
    event: Option<RawEvent>,
    #[serde(default)]
    runners: Vec<RawCatalogueRunner>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalogueRunner {
    selection_id: SelectionId,
    runner_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMarketBook {
    market_id: MarketId,
    status: MarketStatus,
    #[serde(default)]
    inplay: bool,
    #[serde(default)]
    total_matched: Option<Decimal>,
    #[serde(default)]
    runners: Vec<RawBookRunner>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBookRunner {
    selection_id: SelectionId,
    #[serde(default)]
    last_price_traded: Option<Decimal>,
    #[serde(default)]
    total_matched: Option<Decimal>,
    #[serde(default)]
    ex: Option<RawExchangePrices>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExchangePrices {
    #[serde(default)]
    available_to_back: Vec<RawPriceSize>,
    #[serde(default)]
    available_to_lay: Vec<RawPriceSize>,
}

#[derive(Debug, Deserialize)]
struct RawPriceSize {
    price: Decimal,
    size: Decimal,
}

/// Account API client configuration.
#[derive(Debug, Clone)]
pub struct CatalogueConfig {
    pub base_url: String,
    pub app_key: String,
    pub session_token: String,
    pub event_type_ids: Vec<String>,
    pub country_codes: Vec<String>,
    pub market_types: Vec<String>,
    /// How far ahead to fetch markets, in hours.
    pub lookahead_hours: i64,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.betfair.com/exchange/betting/rest/v1.0".to_string(),
            app_key: String::new(),
            session_token: String::new(),
            event_type_ids: vec!["7".to_string()],
            country_codes: vec!["GB".to_string(), "IE".to_string()],
            market_types: vec!["WIN".to_string()],
            lookahead_hours: 12,
        }
    }
}

/// REST implementation of [`CatalogueApi`].
pub struct RestCatalogueClient {
    client: Client,
    config: CatalogueConfig,
}

impl RestCatalogueClient {
    pub fn new(config: CatalogueConfig) -> CatalogueResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| CatalogueError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn post_json<Req: Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        request: &Req,
    ) -> CatalogueResult<Resp> {
        let url = format!("{}/{}/", self.config.base_url, method);
        let response = self
            .client
            .post(&url)
            .header("X-Application", &self.config.app_key)
            .header("X-Authentication", &self.config.session_token)
            .json(request)
            .send()
            .await
            .map_err(|e| CatalogueError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogueError::SessionRejected(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("INVALID_SESSION") {
                return Err(CatalogueError::SessionRejected(body));
            }
            return Err(CatalogueError::HttpClient(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| CatalogueError::Parse(format!("{method}: {e}")))
    }
}

#[async_trait]
impl CatalogueApi for RestCatalogueClient {
    async fn list_market_catalogue(&self) -> CatalogueResult<Vec<CatalogueEntry>> {
        let now = Utc::now();
        let request = CatalogueRequest {
            filter: CatalogueFilter {
                event_type_ids: self.config.event_type_ids.clone(),
                market_countries: self.config.country_codes.clone(),
                market_type_codes: self.config.market_types.clone(),
                market_start_time: TimeRange {
                    from: now,
                    to: now + chrono::Duration::hours(self.config.lookahead_hours),
                },
            },
            market_projection: vec![
                "EVENT".to_string(),
                "MARKET_START_TIME".to_string(),
                "RUNNER_DESCRIPTION".to_string(),
            ],
            sort: "FIRST_TO_START".to_string(),
            max_results: MAX_CATALOGUE_RESULTS,
        };

        let raw: Vec<RawCatalogueEntry> =
            self.post_json("listMarketCatalogue", &request).await?;

        let entries: Vec<CatalogueEntry> = raw.into_iter().map(catalogue_entry).collect();
        info!(markets = entries.len(), "Fetched market catalogue");
        Ok(entries)
    }

    async fn list_market_book(
        &self,
        market_ids: &[MarketId],
    ) -> CatalogueResult<Vec<MarketSnapshot>> {
        debug!(markets = market_ids.len(), "Fetching market book snapshot");
        let request = BookRequest {
            market_ids: market_ids.to_vec(),
            price_projection: PriceProjection {
                price_data: vec!["EX_BEST_OFFERS".to_string(), "EX_TRADED".to_string()],
            },
        };

        let raw: Vec<RawMarketBook> = self.post_json("listMarketBook", &request).await?;
        Ok(raw.into_iter().map(book_snapshot).collect())
    }
}

fn catalogue_entry(raw: RawCatalogueEntry) -> CatalogueEntry {
    let (venue, country_code) = raw
        .event
        .map(|e| {
            (
                e.venue.unwrap_or_default(),
                e.country_code.unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    CatalogueEntry {
        market_id: raw.market_id,
        market_name: raw.market_name,
        venue,
        country_code,
        start_time: raw.market_start_time,
        runner_names: raw
            .runners
            .into_iter()
            .map(|r| (r.selection_id, r.runner_name))
            .collect(),
    }
}

fn book_snapshot(raw: RawMarketBook) -> MarketSnapshot {
    let mut runners = BTreeMap::new();
    for runner in raw.runners {
        let mut ladder = RunnerLadder {
            last_traded: runner.last_price_traded.map(Odds::new),
            total_matched: runner.total_matched.unwrap_or_default(),
            ..Default::default()
        };
        if let Some(ex) = runner.ex {
            ladder.available_to_back = ex
                .available_to_back
                .into_iter()
                .map(|ps| PriceLevel::new(Odds::new(ps.price), ps.size))
                .collect();
            ladder.available_to_lay = ex
                .available_to_lay
                .into_iter()
                .map(|ps| PriceLevel::new(Odds::new(ps.price), ps.size))
                .collect();
        }
        runners.insert(runner.selection_id, ladder);
    }

    MarketSnapshot {
        market_id: raw.market_id,
        status: raw.status,
        in_play: raw.inplay,
        start_time: None,
        last_update: Utc::now(),
        total_matched: raw.total_matched.unwrap_or_default(),
        runners,
    }
}
