//! Connection liveness tracking.
//!
//! The venue emits heartbeat change messages when a subscription is
//! otherwise quiet; the client also sends its own heartbeat frames on a
//! fixed interval. Any inbound traffic counts as proof of life. If the
//! server stays silent past the timeout window the session is torn down
//! and the reconnect loop takes over.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Tracks traffic in both directions and decides when to send a
/// heartbeat and when to declare the connection dead.
pub struct HeartbeatMonitor {
    /// How often we send our own heartbeat frames.
    send_interval: Duration,
    /// How long the server may stay silent before we give up.
    silence_timeout: Duration,
    last_received: Mutex<Instant>,
    last_sent: Mutex<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(send_interval: Duration, silence_timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            send_interval,
            silence_timeout,
            last_received: Mutex::new(now),
            last_sent: Mutex::new(now),
        }
    }

    /// Record any inbound frame, heartbeat or not.
    pub fn record_received(&self) {
        *self.last_received.lock() = Instant::now();
    }

    /// Record an outbound heartbeat frame.
    pub fn record_sent(&self) {
        *self.last_sent.lock() = Instant::now();
    }

    /// True when it is time to send our next heartbeat.
    pub fn should_send(&self) -> bool {
        self.last_sent.lock().elapsed() >= self.send_interval
    }

    /// True when the server has been silent past the timeout window.
    pub fn is_silent(&self) -> bool {
        self.last_received.lock().elapsed() >= self.silence_timeout
    }

    /// Sleep until the next liveness check is due.
    pub async fn wait_for_check(&self) {
        let elapsed = self.last_sent.lock().elapsed();
        let remaining = self.send_interval.saturating_sub(elapsed);
        // Wake at least once a second so silence is detected promptly
        // even with a long send interval.
        tokio::time::sleep(remaining.min(Duration::from_secs(1))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_monitor_is_alive() {
        let hb = HeartbeatMonitor::new(Duration::from_secs(5), Duration::from_secs(30));
        assert!(!hb.is_silent());
        assert!(!hb.should_send());
    }

    #[test]
    fn test_zero_timeout_is_silent_immediately() {
        let hb = HeartbeatMonitor::new(Duration::from_secs(5), Duration::ZERO);
        assert!(hb.is_silent());
        hb.record_received();
        assert!(hb.is_silent());
    }

    #[test]
    fn test_zero_interval_wants_send() {
        let hb = HeartbeatMonitor::new(Duration::ZERO, Duration::from_secs(30));
        assert!(hb.should_send());
        hb.record_sent();
        assert!(hb.should_send());
    }
}
