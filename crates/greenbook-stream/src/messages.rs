//! Wire message types for the streaming protocol.
//!
//! Loosely-typed JSON frames are decoded into a closed set of tagged
//! variants so merge logic downstream is exhaustively handled and a
//! malformed shape fails the single decode step.

use greenbook_core::{MarketId, MarketStatus, SelectionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Client-to-server request frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op")]
pub enum RequestMessage {
    #[serde(rename = "authentication")]
    Authentication {
        id: u64,
        #[serde(rename = "appKey")]
        app_key: String,
        session: String,
    },
    #[serde(rename = "marketSubscription")]
    MarketSubscription {
        id: u64,
        #[serde(rename = "marketFilter")]
        market_filter: MarketFilter,
        #[serde(rename = "marketDataFilter")]
        market_data_filter: MarketDataFilter,
        #[serde(rename = "initialClk", skip_serializing_if = "Option::is_none")]
        initial_clk: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        clk: Option<String>,
    },
    #[serde(rename = "orderSubscription")]
    OrderSubscription { id: u64 },
    #[serde(rename = "heartbeat")]
    Heartbeat { id: u64 },
}

/// Market filter sent with a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketFilter {
    #[serde(rename = "eventTypeIds")]
    pub event_type_ids: Vec<String>,
    #[serde(rename = "countryCodes")]
    pub country_codes: Vec<String>,
    #[serde(rename = "marketTypes")]
    pub market_types: Vec<String>,
    #[serde(rename = "turnInPlayEnabled")]
    pub turn_in_play_enabled: bool,
}

/// Data fields requested from the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataFilter {
    pub fields: Vec<String>,
    #[serde(rename = "ladderLevels")]
    pub ladder_levels: u32,
}

impl Default for MarketDataFilter {
    fn default() -> Self {
        Self {
            fields: vec![
                "EX_BEST_OFFERS_DISP".to_string(),
                "EX_LTP".to_string(),
                "EX_MARKET_DEF".to_string(),
                "EX_TRADED_VOL".to_string(),
            ],
            ladder_levels: 3,
        }
    }
}

/// Server-to-client frames, tagged by `op`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op")]
pub enum StreamMessage {
    #[serde(rename = "connection")]
    Connection {
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
    #[serde(rename = "status")]
    Status {
        #[serde(default)]
        id: Option<u64>,
        #[serde(rename = "statusCode", default)]
        status_code: Option<String>,
        #[serde(rename = "errorCode", default)]
        error_code: Option<String>,
        #[serde(rename = "errorMessage", default)]
        error_message: Option<String>,
        #[serde(rename = "connectionClosed", default)]
        connection_closed: Option<bool>,
    },
    #[serde(rename = "mcm")]
    MarketChange(MarketChangeMessage),
    #[serde(rename = "ocm")]
    OrderChange(OrderChangeMessage),
}

/// Change-message type marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    SubImage,
    ResubDelta,
    Heartbeat,
}

/// Market change message (`mcm`).
#[derive(Debug, Clone, Deserialize)]
pub struct MarketChangeMessage {
    #[serde(default)]
    pub id: Option<u64>,
    /// Publish time (epoch millis).
    #[serde(default)]
    pub pt: Option<i64>,
    #[serde(default)]
    pub ct: Option<ChangeType>,
    #[serde(rename = "initialClk", default)]
    pub initial_clk: Option<String>,
    #[serde(default)]
    pub clk: Option<String>,
    #[serde(default)]
    pub mc: Vec<MarketChange>,
}

impl MarketChangeMessage {
    pub fn is_heartbeat(&self) -> bool {
        self.ct == Some(ChangeType::Heartbeat)
    }
}

/// Per-market change within an `mcm` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketChange {
    pub id: MarketId,
    #[serde(rename = "marketDefinition", default)]
    pub market_definition: Option<MarketDefinition>,
    #[serde(default)]
    pub rc: Vec<RunnerChange>,
    /// Full image: discard prior ladder state for this market.
    #[serde(default)]
    pub img: bool,
    /// Total matched volume for the market (replacement).
    #[serde(default)]
    pub tv: Option<Decimal>,
}

/// Per-runner ladder deltas. Each `atb`/`atl` entry is `[price, size]`;
/// size zero removes the level.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerChange {
    pub id: SelectionId,
    #[serde(default)]
    pub atb: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    pub atl: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    pub ltp: Option<Decimal>,
    #[serde(default)]
    pub tv: Option<Decimal>,
}

/// Market definition delivered with `EX_MARKET_DEF`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketDefinition {
    #[serde(default)]
    pub status: MarketStatus,
    #[serde(rename = "inPlay", default)]
    pub in_play: bool,
    #[serde(rename = "marketTime", default)]
    pub market_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub runners: Vec<RunnerDefinition>,
}

/// Runner entry within a market definition.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerDefinition {
    pub id: SelectionId,
    #[serde(default)]
    pub name: Option<String>,
}

/// Order change message (`ocm`).
#[derive(Debug, Clone, Deserialize)]
pub struct OrderChangeMessage {
    #[serde(default)]
    pub pt: Option<i64>,
    #[serde(default)]
    pub ct: Option<ChangeType>,
    #[serde(default)]
    pub oc: Vec<OrderMarketChange>,
}

/// Per-market order changes.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderMarketChange {
    pub id: MarketId,
    #[serde(default)]
    pub orc: Vec<OrderRunnerChange>,
}

/// Per-runner order changes.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRunnerChange {
    pub id: SelectionId,
    #[serde(default)]
    pub uo: Vec<UnmatchedOrder>,
}

/// Unmatched/updated order report.
#[derive(Debug, Clone, Deserialize)]
pub struct UnmatchedOrder {
    /// Exchange bet reference.
    pub id: String,
    /// Order status: "E" executable, "EC" execution complete.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub p: Option<Decimal>,
    #[serde(default)]
    pub s: Option<Decimal>,
    /// Size matched.
    #[serde(default)]
    pub sm: Option<Decimal>,
    /// Size remaining.
    #[serde(default)]
    pub sr: Option<Decimal>,
    /// Average price matched.
    #[serde(default)]
    pub avp: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_market_change_with_deltas() {
        let raw = r#"{"op":"mcm","pt":1700000000000,"clk":"abc","mc":[{"id":"1.234","rc":[{"id":101,"atl":[[3.5,12.0],[3.55,0]],"ltp":3.45}]}]}"#;
        let msg: StreamMessage = serde_json::from_str(raw).expect("decode");
        match msg {
            StreamMessage::MarketChange(mcm) => {
                assert_eq!(mcm.clk.as_deref(), Some("abc"));
                assert_eq!(mcm.mc.len(), 1);
                let rc = &mcm.mc[0].rc[0];
                assert_eq!(rc.atl[0], (dec!(3.5), dec!(12.0)));
                assert_eq!(rc.atl[1].1, dec!(0));
                assert_eq!(rc.ltp, Some(dec!(3.45)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_decode_heartbeat_mcm() {
        let raw = r#"{"op":"mcm","id":2,"ct":"HEARTBEAT","clk":"def","pt":1700000000001}"#;
        let msg: StreamMessage = serde_json::from_str(raw).expect("decode");
        match msg {
            StreamMessage::MarketChange(mcm) => {
                assert!(mcm.is_heartbeat());
                assert!(mcm.mc.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_decode_image_flag_and_definition() {
        let raw = r#"{"op":"mcm","pt":1,"mc":[{"id":"1.234","img":true,
            "marketDefinition":{"status":"SUSPENDED","inPlay":true,
            "marketTime":"2026-08-23T14:30:00.000Z","venue":"Ascot",
            "runners":[{"id":101,"name":"Dancer"}]},
            "tv":1234.5}]}"#;
        let msg: StreamMessage = serde_json::from_str(raw).expect("decode");
        match msg {
            StreamMessage::MarketChange(mcm) => {
                let mc = &mcm.mc[0];
                assert!(mc.img);
                let def = mc.market_definition.as_ref().expect("definition");
                assert_eq!(def.status, greenbook_core::MarketStatus::Suspended);
                assert!(def.in_play);
                assert_eq!(def.venue.as_deref(), Some("Ascot"));
                assert_eq!(def.runners[0].name.as_deref(), Some("Dancer"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_decode_order_change() {
        let raw = r#"{"op":"ocm","pt":5,"oc":[{"id":"1.234","orc":[{"id":101,
            "uo":[{"id":"99887","status":"EC","p":3.5,"s":2.0,"sm":2.0,"sr":0,"avp":3.5}]}]}]}"#;
        let msg: StreamMessage = serde_json::from_str(raw).expect("decode");
        match msg {
            StreamMessage::OrderChange(ocm) => {
                let uo = &ocm.oc[0].orc[0].uo[0];
                assert_eq!(uo.id, "99887");
                assert_eq!(uo.sm, Some(dec!(2.0)));
                assert_eq!(uo.sr, Some(dec!(0)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_frame_fails_single_decode() {
        let raw = r#"{"op":"mcm","mc":[{"rc":"not-a-list"}]}"#;
        assert!(serde_json::from_str::<StreamMessage>(raw).is_err());
    }

    #[test]
    fn test_serialize_authentication() {
        let req = RequestMessage::Authentication {
            id: 1,
            app_key: "key".into(),
            session: "token".into(),
        };
        let json = serde_json::to_string(&req).expect("serialize");
        assert!(json.contains(r#""op":"authentication""#));
        assert!(json.contains(r#""appKey":"key""#));
    }
}
