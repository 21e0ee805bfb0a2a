//! Stream error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication rejected: {code}: {message}")]
    AuthenticationRejected { code: String, message: String },

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("No server traffic within timeout window")]
    SilenceTimeout,

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Event receiver dropped")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// Fatal errors must be surfaced to the operator, never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationRejected { .. })
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
