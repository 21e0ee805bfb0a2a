//! Application configuration.
//!
//! Loaded from a TOML file with a `GREENBOOK_` environment overlay, so
//! credentials never have to live on disk: `GREENBOOK__CREDENTIALS__
//! SESSION_TOKEN=...` overrides `[credentials] session_token`. Every
//! field has a default; a missing config file yields a runnable
//! (credential-less) configuration for staging against recorded data.

use crate::error::{AppError, AppResult};
use greenbook_catalogue::client::CatalogueConfig;
use greenbook_core::RiskSettings;
use greenbook_exec::OrderApiConfig;
use greenbook_stream::StreamConfig;
use serde::{Deserialize, Serialize};

/// Exchange credentials shared by the stream, catalogue, and order APIs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub session_token: String,
}

/// Streaming feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSection {
    #[serde(default = "default_stream_host")]
    pub host: String,
    #[serde(default = "default_stream_port")]
    pub port: u16,
    /// 0 = retry forever.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_stream_host() -> String {
    "stream-api.betfair.com".to_string()
}

fn default_stream_port() -> u16 {
    443
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_heartbeat_interval_ms() -> u64 {
    5000
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            host: default_stream_host(),
            port: default_stream_port(),
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

/// Market filter applied to both the stream subscription and the
/// catalogue fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketsSection {
    #[serde(default = "default_event_type_ids")]
    pub event_type_ids: Vec<String>,
    #[serde(default = "default_country_codes")]
    pub country_codes: Vec<String>,
    #[serde(default = "default_market_types")]
    pub market_types: Vec<String>,
}

fn default_event_type_ids() -> Vec<String> {
    vec!["7".to_string()] // horse racing
}

fn default_country_codes() -> Vec<String> {
    vec!["GB".to_string(), "IE".to_string()]
}

fn default_market_types() -> Vec<String> {
    vec!["WIN".to_string()]
}

impl Default for MarketsSection {
    fn default() -> Self {
        Self {
            event_type_ids: default_event_type_ids(),
            country_codes: default_country_codes(),
            market_types: default_market_types(),
        }
    }
}

/// Catalogue REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueSection {
    #[serde(default = "default_catalogue_base_url")]
    pub base_url: String,
    #[serde(default = "default_lookahead_hours")]
    pub lookahead_hours: i64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_catalogue_base_url() -> String {
    "https://api.betfair.com/exchange/betting/rest/v1.0".to_string()
}

fn default_lookahead_hours() -> i64 {
    12
}

fn default_refresh_interval_secs() -> u64 {
    300
}

impl Default for CatalogueSection {
    fn default() -> Self {
        Self {
            base_url: default_catalogue_base_url(),
            lookahead_hours: default_lookahead_hours(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

/// Order placement API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersSection {
    #[serde(default = "default_orders_base_url")]
    pub base_url: String,
}

fn default_orders_base_url() -> String {
    "https://api.betfair.com/exchange/betting/rest/v1.0".to_string()
}

impl Default for OrdersSection {
    fn default() -> Self {
        Self {
            base_url: default_orders_base_url(),
        }
    }
}

/// Engine loop settings. Risk settings loaded here become the initial
/// session settings; the control surface can change them at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    #[serde(default)]
    pub risk: RiskSettings,
}

fn default_scan_interval_ms() -> u64 {
    2000
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval_ms(),
            risk: RiskSettings::default(),
        }
    }
}

/// Control surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_port() -> u16 {
    8090
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_server_port(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub stream: StreamSection,
    #[serde(default)]
    pub markets: MarketsSection,
    #[serde(default)]
    pub catalogue: CatalogueSection,
    #[serde(default)]
    pub orders: OrdersSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load from a TOML file (optional) overlaid with `GREENBOOK_`
    /// environment variables (`__` as the section separator).
    pub fn load(path: &str) -> AppResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("GREENBOOK").separator("__"))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to load config: {e}")))?;
        settings
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            host: self.stream.host.clone(),
            port: self.stream.port,
            app_key: self.credentials.app_key.clone(),
            session_token: self.credentials.session_token.clone(),
            event_type_ids: self.markets.event_type_ids.clone(),
            country_codes: self.markets.country_codes.clone(),
            market_types: self.markets.market_types.clone(),
            max_reconnect_attempts: self.stream.max_reconnect_attempts,
            reconnect_base_delay_ms: self.stream.reconnect_base_delay_ms,
            heartbeat_interval_ms: self.stream.heartbeat_interval_ms,
            ..StreamConfig::default()
        }
    }

    pub fn catalogue_config(&self) -> CatalogueConfig {
        CatalogueConfig {
            base_url: self.catalogue.base_url.clone(),
            app_key: self.credentials.app_key.clone(),
            session_token: self.credentials.session_token.clone(),
            event_type_ids: self.markets.event_type_ids.clone(),
            country_codes: self.markets.country_codes.clone(),
            market_types: self.markets.market_types.clone(),
            lookahead_hours: self.catalogue.lookahead_hours,
        }
    }

    pub fn order_config(&self) -> OrderApiConfig {
        OrderApiConfig {
            base_url: self.orders.base_url.clone(),
            app_key: self.credentials.app_key.clone(),
            session_token: self.credentials.session_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.stream.host, "stream-api.betfair.com");
        assert_eq!(cfg.engine.scan_interval_ms, 2000);
        assert_eq!(cfg.engine.risk.max_daily_exposure, dec!(75.00));
        assert_eq!(cfg.markets.event_type_ids, vec!["7"]);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = r#"
            data_dir = "/var/lib/greenbook"

            [credentials]
            app_key = "key123"

            [engine]
            scan_interval_ms = 500

            [engine.risk]
            max_liability_per_bet = "5.00"
        "#;
        let cfg: AppConfig = toml::from_str(raw).expect("parse");
        assert_eq!(cfg.data_dir, "/var/lib/greenbook");
        assert_eq!(cfg.credentials.app_key, "key123");
        assert_eq!(cfg.engine.scan_interval_ms, 500);
        assert_eq!(cfg.engine.risk.max_liability_per_bet, dec!(5.00));
        // Untouched fields keep defaults.
        assert_eq!(cfg.engine.risk.max_bets_per_race, 1);
        assert_eq!(cfg.server.port, 8090);
    }

    #[test]
    fn test_section_conversions_share_credentials() {
        let mut cfg = AppConfig::default();
        cfg.credentials.app_key = "key".into();
        cfg.credentials.session_token = "tok".into();

        assert_eq!(cfg.stream_config().app_key, "key");
        assert_eq!(cfg.catalogue_config().session_token, "tok");
        assert_eq!(cfg.order_config().app_key, "key");
    }
}
