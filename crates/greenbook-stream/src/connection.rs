//! Stream connection manager.
//!
//! Handles connection lifecycle, the authenticate-then-subscribe
//! handshake, automatic reconnection with exponential backoff, and
//! resume-token replay after reconnection.

use crate::error::{StreamError, StreamResult};
use crate::heartbeat::HeartbeatMonitor;
use crate::messages::{
    MarketChangeMessage, MarketDataFilter, MarketFilter, OrderChangeMessage, RequestMessage,
    StreamMessage,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Stream connection configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Streaming endpoint hostname.
    pub host: String,
    pub port: u16,
    /// Application key presented during authentication.
    pub app_key: String,
    /// Session token presented during authentication.
    pub session_token: String,
    /// Event type ids to subscribe to (e.g. "7" for horse racing).
    pub event_type_ids: Vec<String>,
    pub country_codes: Vec<String>,
    pub market_types: Vec<String>,
    /// Ladder depth requested from the feed.
    pub ladder_levels: u32,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// How often to send client heartbeat frames.
    pub heartbeat_interval_ms: u64,
    /// Server silence window before the session is declared dead.
    pub silence_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "stream-api.betfair.com".to_string(),
            port: 443,
            app_key: String::new(),
            session_token: String::new(),
            event_type_ids: vec!["7".to_string()],
            country_codes: vec!["GB".to_string(), "IE".to_string()],
            market_types: vec!["WIN".to_string()],
            ladder_levels: 3,
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            heartbeat_interval_ms: 5000,
            silence_timeout_ms: 30000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Decoded change messages forwarded downstream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    MarketChange(MarketChangeMessage),
    OrderChange(OrderChangeMessage),
}

/// Resume tokens carried across reconnects so the venue can replay
/// missed deltas instead of sending a fresh image.
#[derive(Debug, Default, Clone)]
struct ResumeTokens {
    initial_clk: Option<String>,
    clk: Option<String>,
}

/// Stream connection manager.
pub struct StreamClient {
    config: StreamConfig,
    state: Arc<RwLock<ConnectionState>>,
    heartbeat: Arc<HeartbeatMonitor>,
    event_tx: mpsc::Sender<StreamEvent>,
    next_id: AtomicU64,
    resume: Mutex<ResumeTokens>,
    reconnect_count: Arc<RwLock<u32>>,
    shutdown_token: CancellationToken,
}

impl StreamClient {
    pub fn new(config: StreamConfig, event_tx: mpsc::Sender<StreamEvent>) -> Self {
        let heartbeat = Arc::new(HeartbeatMonitor::new(
            Duration::from_millis(config.heartbeat_interval_ms),
            Duration::from_millis(config.silence_timeout_ms),
        ));
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            heartbeat,
            event_tx,
            next_id: AtomicU64::new(1),
            resume: Mutex::new(ResumeTokens::default()),
            reconnect_count: Arc::new(RwLock::new(0)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Token cancelled when [`shutdown`](Self::shutdown) is called.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Signal graceful shutdown.
    pub fn shutdown(&self) {
        info!("Stream client shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Connect and run the session loop until shutdown.
    ///
    /// Transient failures reconnect with exponential backoff; a rejected
    /// authentication returns immediately so the operator can act.
    pub async fn run(&self) -> StreamResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            let session_start = std::time::Instant::now();
            match self.try_session().await {
                Ok(()) => {
                    info!("Stream session closed");
                }
                Err(e) if e.is_fatal() => {
                    error!(%e, "Fatal stream error, not reconnecting");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Err(e);
                }
                Err(e) => {
                    error!(%e, "Stream session error");
                }
            }

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            attempt = next_attempt(attempt, session_start.elapsed());
            *self.reconnect_count.write() = attempt;

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                return Err(StreamError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            *self.state.write() = ConnectionState::Reconnecting;

            let delay = calculate_backoff_delay(
                self.config.reconnect_base_delay_ms,
                self.config.reconnect_max_delay_ms,
                attempt,
            );
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    async fn try_session(&self) -> StreamResult<()> {
        info!(host = %self.config.host, port = self.config.port, "Connecting to stream endpoint");

        let tcp = TcpStream::connect((self.config.host.as_str(), self.config.port)).await?;
        tcp.set_nodelay(true)?;

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let server_name = ServerName::try_from(self.config.host.clone())
            .map_err(|e| StreamError::ConnectionFailed(format!("invalid host name: {e}")))?;
        let connector = TlsConnector::from(Arc::new(tls_config));
        let tls = connector.connect(server_name, tcp).await?;

        let (read_half, mut write) = tokio::io::split(tls);
        let mut lines = BufReader::new(read_half).lines();

        // First frame from the server is the connection message.
        let first = lines
            .next_line()
            .await?
            .ok_or_else(|| StreamError::ConnectionClosed("no connection frame".to_string()))?;
        match serde_json::from_str::<StreamMessage>(&first)? {
            StreamMessage::Connection { connection_id } => {
                info!(%connection_id, "Stream connection established");
            }
            other => {
                return Err(StreamError::ConnectionFailed(format!(
                    "expected connection frame, got {other:?}"
                )));
            }
        }

        // Authenticate and wait for the status reply before subscribing.
        let auth = RequestMessage::Authentication {
            id: self.next_request_id(),
            app_key: self.config.app_key.clone(),
            session: self.config.session_token.clone(),
        };
        send_frame(&mut write, &auth).await?;

        let reply = lines
            .next_line()
            .await?
            .ok_or_else(|| StreamError::ConnectionClosed("closed during auth".to_string()))?;
        match serde_json::from_str::<StreamMessage>(&reply)? {
            StreamMessage::Status {
                status_code,
                error_code,
                error_message,
                ..
            } => {
                if status_code.as_deref() != Some("SUCCESS") {
                    return Err(StreamError::AuthenticationRejected {
                        code: error_code.unwrap_or_else(|| "UNKNOWN".to_string()),
                        message: error_message.unwrap_or_default(),
                    });
                }
                info!("Stream authentication succeeded");
            }
            other => {
                return Err(StreamError::ConnectionFailed(format!(
                    "expected auth status, got {other:?}"
                )));
            }
        }

        // Subscribe to market and order channels. Resume tokens from a
        // prior session let the venue replay missed deltas.
        let resume = self.resume.lock().clone();
        let market_sub = RequestMessage::MarketSubscription {
            id: self.next_request_id(),
            market_filter: MarketFilter {
                event_type_ids: self.config.event_type_ids.clone(),
                country_codes: self.config.country_codes.clone(),
                market_types: self.config.market_types.clone(),
                turn_in_play_enabled: true,
            },
            market_data_filter: MarketDataFilter {
                ladder_levels: self.config.ladder_levels,
                ..MarketDataFilter::default()
            },
            initial_clk: resume.initial_clk,
            clk: resume.clk,
        };
        send_frame(&mut write, &market_sub).await?;

        let order_sub = RequestMessage::OrderSubscription {
            id: self.next_request_id(),
        };
        send_frame(&mut write, &order_sub).await?;

        *self.state.write() = ConnectionState::Connected;
        *self.reconnect_count.write() = 0;
        self.heartbeat.record_received();
        self.heartbeat.record_sent();
        info!("Stream subscriptions sent");

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in stream loop");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                line = lines.next_line() => {
                    match line {
                        Ok(Some(text)) => {
                            self.heartbeat.record_received();
                            self.handle_frame(&text).await?;
                        }
                        Ok(None) => {
                            warn!("Stream ended by server");
                            return Err(StreamError::ConnectionClosed(
                                "stream ended".to_string(),
                            ));
                        }
                        Err(e) => {
                            error!(%e, "Stream read error");
                            return Err(e.into());
                        }
                    }
                }

                _ = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_silent() {
                        error!("No server traffic within silence window");
                        return Err(StreamError::SilenceTimeout);
                    }
                    if self.heartbeat.should_send() {
                        let hb = RequestMessage::Heartbeat { id: self.next_request_id() };
                        send_frame(&mut write, &hb).await?;
                        self.heartbeat.record_sent();
                        debug!("Sent heartbeat frame");
                    }
                }
            }
        }
    }

    /// Decode one inbound frame and forward change messages downstream.
    ///
    /// A malformed frame is logged and dropped; the session survives.
    async fn handle_frame(&self, text: &str) -> StreamResult<()> {
        let msg: StreamMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%e, frame = %truncate(text, 200), "Dropping malformed frame");
                return Ok(());
            }
        };

        match msg {
            StreamMessage::MarketChange(mcm) => {
                {
                    let mut resume = self.resume.lock();
                    if let Some(initial) = &mcm.initial_clk {
                        resume.initial_clk = Some(initial.clone());
                    }
                    if let Some(clk) = &mcm.clk {
                        resume.clk = Some(clk.clone());
                    }
                }

                // Heartbeat change messages carry no data worth forwarding.
                if mcm.is_heartbeat() {
                    debug!("Received market heartbeat");
                    return Ok(());
                }

                if self
                    .event_tx
                    .send(StreamEvent::MarketChange(mcm))
                    .await
                    .is_err()
                {
                    warn!("Event receiver dropped");
                    return Err(StreamError::ChannelClosed);
                }
            }
            StreamMessage::OrderChange(ocm) => {
                if ocm.ct == Some(crate::messages::ChangeType::Heartbeat) {
                    debug!("Received order heartbeat");
                    return Ok(());
                }
                if self
                    .event_tx
                    .send(StreamEvent::OrderChange(ocm))
                    .await
                    .is_err()
                {
                    warn!("Event receiver dropped");
                    return Err(StreamError::ChannelClosed);
                }
            }
            StreamMessage::Status {
                status_code,
                error_code,
                error_message,
                connection_closed,
                ..
            } => {
                if status_code.as_deref() == Some("FAILURE") {
                    warn!(
                        code = error_code.as_deref().unwrap_or("UNKNOWN"),
                        message = error_message.as_deref().unwrap_or(""),
                        "Subscription status failure"
                    );
                    if connection_closed == Some(true) {
                        return Err(StreamError::SubscriptionFailed(
                            error_code.unwrap_or_else(|| "UNKNOWN".to_string()),
                        ));
                    }
                } else {
                    debug!(code = status_code.as_deref().unwrap_or(""), "Status frame");
                }
            }
            StreamMessage::Connection { connection_id } => {
                debug!(%connection_id, "Unexpected connection frame mid-session");
            }
        }

        Ok(())
    }
}

async fn send_frame<W>(write: &mut W, request: &RequestMessage) -> StreamResult<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut payload = serde_json::to_vec(request)?;
    payload.extend_from_slice(b"\r\n");
    write.write_all(&payload).await?;
    write.flush().await?;
    Ok(())
}

/// A session that stays connected this long counts as sustained: the
/// next disconnect restarts the backoff ladder from the base delay and
/// a fresh attempt budget.
const STABLE_SESSION: Duration = Duration::from_secs(60);

fn next_attempt(previous: u32, session_duration: Duration) -> u32 {
    if session_duration >= STABLE_SESSION {
        1
    } else {
        previous.saturating_add(1)
    }
}

fn calculate_backoff_delay(base: u64, max: u64, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped, plus 0-1000ms jitter.
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = base.saturating_mul(1u64 << exponent).min(max);
    Duration::from_millis(delay + rand_jitter())
}

/// Generate random jitter (0-1000ms).
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as u64
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.max_reconnect_attempts, 0); // Infinite
        assert_eq!(config.ladder_levels, 3);
        assert_eq!(config.silence_timeout_ms, 30000);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let d1 = calculate_backoff_delay(1000, 60000, 1);
        let d4 = calculate_backoff_delay(1000, 60000, 4);
        let d20 = calculate_backoff_delay(1000, 60000, 20);
        assert!(d1 >= Duration::from_millis(1000));
        assert!(d1 < Duration::from_millis(2001));
        assert!(d4 >= Duration::from_millis(8000));
        assert!(d20 <= Duration::from_millis(61000));
    }

    #[test]
    fn test_backoff_resets_after_sustained_session() {
        // Short-lived sessions keep climbing the ladder.
        assert_eq!(next_attempt(0, Duration::from_secs(2)), 1);
        assert_eq!(next_attempt(5, Duration::from_secs(2)), 6);
        // A sustained session drops back to attempt 1, so the next
        // disconnect waits the base delay again.
        assert_eq!(next_attempt(5, STABLE_SESSION), 1);
        let delay = calculate_backoff_delay(
            1000,
            60000,
            next_attempt(9, Duration::from_secs(3600)),
        );
        assert!(delay < Duration::from_millis(2001));
    }

    #[tokio::test]
    async fn test_heartbeat_mcm_not_forwarded() {
        let (tx, mut rx) = mpsc::channel(8);
        let client = StreamClient::new(StreamConfig::default(), tx);

        client
            .handle_frame(r#"{"op":"mcm","ct":"HEARTBEAT","clk":"tok1"}"#)
            .await
            .expect("frame handled");
        client
            .handle_frame(
                r#"{"op":"mcm","clk":"tok2","mc":[{"id":"1.1","rc":[{"id":5,"ltp":3.2}]}]}"#,
            )
            .await
            .expect("frame handled");

        // Only the data-bearing frame comes through.
        match rx.try_recv().expect("one event") {
            StreamEvent::MarketChange(mcm) => assert_eq!(mcm.mc.len(), 1),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());

        // Both frames advanced the resume token.
        assert_eq!(client.resume.lock().clk.as_deref(), Some("tok2"));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let (tx, mut rx) = mpsc::channel(8);
        let client = StreamClient::new(StreamConfig::default(), tx);

        client
            .handle_frame(r#"{"op":"mcm","mc":"garbage"#)
            .await
            .expect("malformed frame dropped, not fatal");
        assert!(rx.try_recv().is_err());
    }
}
