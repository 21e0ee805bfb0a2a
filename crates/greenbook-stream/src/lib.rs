//! Exchange streaming feed client.
//!
//! Maintains a persistent, authenticated TLS connection to the venue's
//! streaming endpoint. Messages are newline-delimited JSON: after the
//! connection frame the client authenticates, subscribes to market and
//! order channels, then forwards decoded change messages downstream.
//!
//! Authentication failure is fatal and surfaced to the caller; any other
//! disconnect triggers reconnection with exponential backoff.

pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod messages;

pub use connection::{ConnectionState, StreamClient, StreamConfig, StreamEvent};
pub use error::{StreamError, StreamResult};
pub use heartbeat::HeartbeatMonitor;
pub use messages::{
    ChangeType, MarketChange, MarketChangeMessage, MarketDataFilter, MarketDefinition,
    MarketFilter, OrderChangeMessage, OrderMarketChange, OrderRunnerChange, RequestMessage,
    RunnerChange, RunnerDefinition, StreamMessage, UnmatchedOrder,
};

/// Initialize the TLS crypto provider.
///
/// Must be called once before any stream connections are opened.
pub fn init_crypto() {
    let _ = tokio_rustls::rustls::crypto::aws_lc_rs::default_provider().install_default();
}
