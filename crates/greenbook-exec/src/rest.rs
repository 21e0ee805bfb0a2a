//! REST order placement.
//!
//! One placeOrders call per candidate with a tight timeout so a slow
//! venue cannot stall the scan cycle. The customer reference is derived
//! from the candidate, which makes an accidental resend idempotent on
//! the venue side.

use crate::error::{ExecError, ExecResult};
use crate::executor::BetExecutor;
use async_trait::async_trait;
use greenbook_core::{BetCandidate, BetOutcome, BetSource};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// Placement calls get a tighter timeout than metadata reads; a cycle
/// must not hang on one market's bet.
const PLACEMENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct OrderApiConfig {
    pub base_url: String,
    pub app_key: String,
    pub session_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrdersRequest {
    market_id: String,
    instructions: Vec<PlaceInstruction>,
    customer_ref: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaceInstruction {
    selection_id: i64,
    side: String,
    order_type: String,
    limit_order: LimitOrder,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LimitOrder {
    size: Decimal,
    price: Decimal,
    persistence_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrdersResponse {
    status: String,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    instruction_reports: Vec<InstructionReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstructionReport {
    status: String,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    bet_id: Option<String>,
}

/// Live implementation of [`BetExecutor`] against the placement API.
pub struct RestOrderExecutor {
    client: Client,
    config: OrderApiConfig,
}

impl RestOrderExecutor {
    pub fn new(config: OrderApiConfig) -> ExecResult<Self> {
        let client = Client::builder()
            .timeout(PLACEMENT_TIMEOUT)
            .build()
            .map_err(|e| ExecError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Customer reference derived from the candidate, not minted fresh:
    /// resending the same placement carries the same reference, so the
    /// venue deduplicates it.
    fn customer_ref(candidate: &BetCandidate) -> String {
        let name = format!("{}:{}", candidate.market_id, candidate.selection_id);
        format!(
            "gb-{}",
            Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).simple()
        )
    }

    fn build_request(candidate: &BetCandidate) -> PlaceOrdersRequest {
        PlaceOrdersRequest {
            market_id: candidate.market_id.to_string(),
            instructions: vec![PlaceInstruction {
                selection_id: candidate.selection_id.0,
                side: "LAY".to_string(),
                order_type: "LIMIT".to_string(),
                limit_order: LimitOrder {
                    size: candidate.stake.inner(),
                    price: candidate.odds.inner(),
                    persistence_type: "LAPSE".to_string(),
                },
            }],
            customer_ref: Self::customer_ref(candidate),
        }
    }
}

#[async_trait]
impl BetExecutor for RestOrderExecutor {
    fn source(&self) -> BetSource {
        BetSource::Auto
    }

    async fn execute(&self, candidate: &BetCandidate) -> BetOutcome {
        let request = Self::build_request(candidate);
        info!(
            market_id = %candidate.market_id,
            runner = %candidate.runner_name,
            odds = %candidate.odds,
            stake = %candidate.stake,
            customer_ref = %request.customer_ref,
            "Placing lay order"
        );

        let url = format!("{}/placeOrders/", self.config.base_url);
        let response = match self
            .client
            .post(&url)
            .header("X-Application", &self.config.app_key)
            .header("X-Authentication", &self.config.session_token)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(%e, market_id = %candidate.market_id, "Placement request failed");
                return BetOutcome::failure(format!("placement request failed: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, market_id = %candidate.market_id, "Placement rejected");
            return BetOutcome::failure(format!("HTTP {status}: {body}"));
        }

        let parsed: PlaceOrdersResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => return BetOutcome::failure(format!("unparseable placement response: {e}")),
        };

        if parsed.status != "SUCCESS" {
            let code = parsed
                .instruction_reports
                .first()
                .and_then(|r| r.error_code.clone())
                .or(parsed.error_code)
                .unwrap_or_else(|| "UNKNOWN".to_string());
            return BetOutcome::failure(format!("placement failed: {code}"));
        }

        match parsed
            .instruction_reports
            .first()
            .and_then(|r| (r.status == "SUCCESS").then(|| r.bet_id.clone()).flatten())
        {
            Some(bet_id) => {
                info!(%bet_id, market_id = %candidate.market_id, "Order placed");
                BetOutcome::success(bet_id)
            }
            None => BetOutcome::failure("placement succeeded without a bet reference"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenbook_core::{Confidence, MarketId, Odds, SelectionId, Stake, Zone};
    use rust_decimal_macros::dec;

    fn candidate(market: &str, selection: i64) -> BetCandidate {
        BetCandidate {
            market_id: MarketId::new(market),
            selection_id: SelectionId(selection),
            runner_name: "Runner".into(),
            odds: Odds::new(dec!(3.75)),
            stake: Stake::new(dec!(3.00)),
            liability: dec!(8.25),
            zone: Zone::Prime,
            confidence: Confidence::High,
            reason: "test".into(),
        }
    }

    #[test]
    fn test_place_request_shape() {
        let request = RestOrderExecutor::build_request(&candidate("1.234", 101));
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""marketId":"1.234""#));
        assert!(json.contains(r#""selectionId":101"#));
        assert!(json.contains(r#""side":"LAY""#));
        assert!(json.contains(r#""persistenceType":"LAPSE""#));
        assert!(request.customer_ref.starts_with("gb-"));
    }

    #[test]
    fn test_customer_ref_stable_per_candidate() {
        // Same candidate, same reference, so a resend deduplicates on
        // the venue side.
        let first = RestOrderExecutor::build_request(&candidate("1.234", 101));
        let second = RestOrderExecutor::build_request(&candidate("1.234", 101));
        assert_eq!(first.customer_ref, second.customer_ref);

        // A different runner or market gets its own reference.
        let other_runner = RestOrderExecutor::build_request(&candidate("1.234", 102));
        let other_market = RestOrderExecutor::build_request(&candidate("1.235", 101));
        assert_ne!(first.customer_ref, other_runner.customer_ref);
        assert_ne!(first.customer_ref, other_market.customer_ref);
    }

    #[test]
    fn test_failed_instruction_report_parsed() {
        let raw = r#"{
            "status": "FAILURE",
            "errorCode": "BET_ACTION_ERROR",
            "instructionReports": [{"status": "FAILURE", "errorCode": "INVALID_BET_SIZE"}]
        }"#;
        let parsed: PlaceOrdersResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.status, "FAILURE");
        assert_eq!(
            parsed.instruction_reports[0].error_code.as_deref(),
            Some("INVALID_BET_SIZE")
        );
    }
}
