//! Human-readable activity trail.
//!
//! A bounded in-memory ring the operator surface reads for "what has
//! the engine been doing". Entries also go to the tracing log; the ring
//! exists so the control surface can show recent history without
//! tailing log files.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::info;

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    ModeChange,
    BetPlaced,
    BetStaged,
    BetFailed,
    RiskLimit,
    StopLoss,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub kind: ActivityKind,
    pub message: String,
}

pub struct ActivityTrail {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl ActivityTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, kind: ActivityKind, message: impl Into<String>) {
        let message = message.into();
        info!(?kind, %message, "Activity");
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(ActivityEntry {
            at: Utc::now(),
            kind,
            message,
        });
    }

    /// Most recent entries, newest last.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        let entries = self.entries.lock();
        entries
            .iter()
            .skip(entries.len().saturating_sub(limit))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for ActivityTrail {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_bounded() {
        let trail = ActivityTrail::new(3);
        for i in 0..5 {
            trail.push(ActivityKind::Info, format!("entry {i}"));
        }
        assert_eq!(trail.len(), 3);
        let recent = trail.recent(10);
        assert_eq!(recent[0].message, "entry 2");
        assert_eq!(recent[2].message, "entry 4");
    }

    #[test]
    fn test_recent_limit() {
        let trail = ActivityTrail::new(10);
        for i in 0..5 {
            trail.push(ActivityKind::Info, format!("entry {i}"));
        }
        let recent = trail.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].message, "entry 4");
    }
}
