//! Decision ledger.
//!
//! Append-only JSON Lines file with daily rotation. Each line is one
//! complete decision record, so an interrupted write corrupts at most
//! that line and the file stays readable. Append mode means restarts
//! never truncate existing audit history.

use crate::error::PersistenceResult;
use chrono::Utc;
use greenbook_core::DecisionRecord;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

struct LedgerInner {
    active: Option<ActiveWriter>,
    /// Records kept in memory when no directory is configured, and for
    /// the status surface's recent-decision view either way.
    recent: Vec<DecisionRecord>,
}

/// Append-only store of every plugin evaluation.
pub struct DecisionLedger {
    base_dir: Option<PathBuf>,
    max_recent: usize,
    inner: Mutex<LedgerInner>,
}

impl DecisionLedger {
    /// File-backed ledger under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, max_recent: usize) -> Self {
        let base_dir: PathBuf = base_dir.into();
        if let Err(e) = std::fs::create_dir_all(&base_dir) {
            warn!(?e, dir = %base_dir.display(), "Failed to create ledger directory");
        }
        Self {
            base_dir: Some(base_dir),
            max_recent,
            inner: Mutex::new(LedgerInner {
                active: None,
                recent: Vec::new(),
            }),
        }
    }

    /// Memory-only ledger for tests.
    pub fn in_memory(max_recent: usize) -> Self {
        Self {
            base_dir: None,
            max_recent,
            inner: Mutex::new(LedgerInner {
                active: None,
                recent: Vec::new(),
            }),
        }
    }

    /// Append one record. Never skipped, even for SKIP decisions.
    pub fn append(&self, record: &DecisionRecord) -> PersistenceResult<()> {
        let mut inner = self.inner.lock();

        if let Some(base_dir) = &self.base_dir {
            let today = Utc::now().format("%Y-%m-%d").to_string();

            let needs_rotation = inner
                .active
                .as_ref()
                .map(|w| w.date != today)
                .unwrap_or(false);
            if needs_rotation {
                if let Some(mut old) = inner.active.take() {
                    if let Err(e) = old.writer.flush() {
                        warn!(?e, "Failed to flush ledger on rotation");
                    }
                    info!(date = %old.date, records = old.records_written, "Rotated decision ledger");
                }
            }

            if inner.active.is_none() {
                let filename = base_dir.join(format!("decisions_{today}.jsonl"));
                debug!(file = %filename.display(), "Opening decision ledger (append mode)");
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&filename)?;
                inner.active = Some(ActiveWriter {
                    writer: BufWriter::new(file),
                    date: today,
                    records_written: 0,
                });
            }

            let active = inner.active.as_mut().expect("active ledger writer");
            let json = serde_json::to_string(record)?;
            writeln!(active.writer, "{json}")?;
            active.writer.flush()?;
            active.records_written += 1;
        }

        inner.recent.push(record.clone());
        if inner.recent.len() > self.max_recent {
            let excess = inner.recent.len() - self.max_recent;
            inner.recent.drain(..excess);
        }

        Ok(())
    }

    /// Most recent records, newest last.
    pub fn recent(&self, limit: usize) -> Vec<DecisionRecord> {
        let inner = self.inner.lock();
        let start = inner.recent.len().saturating_sub(limit);
        inner.recent[start..].to_vec()
    }

    pub fn recent_count(&self) -> usize {
        self.inner.lock().recent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use greenbook_core::{DecisionAction, MarketId};
    use rust_decimal::Decimal;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    fn record(market: &str, action: DecisionAction) -> DecisionRecord {
        DecisionRecord {
            market_id: MarketId::new(market),
            market_name: "2m Hcap".into(),
            venue: "Kempton".into(),
            race_time: Utc::now(),
            plugin_id: "tiered_lay_v1".into(),
            action,
            reason: "test".into(),
            runners: vec![],
            candidates: vec![],
            daily_pnl: Decimal::ZERO,
            daily_exposure: Decimal::ZERO,
            bets_today: 0,
            minutes_to_start: Some(12.0),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_writes_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let ledger = DecisionLedger::new(dir.path(), 100);

        ledger.append(&record("1.1", DecisionAction::Skip)).unwrap();
        ledger
            .append(&record("1.2", DecisionAction::Accept))
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);

        let file = File::open(entries[0].path()).unwrap();
        let lines: Vec<_> = BufReader::new(file).lines().map_while(|l| l.ok()).collect();
        assert_eq!(lines.len(), 2);

        let parsed: DecisionRecord = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(parsed.market_id, MarketId::new("1.2"));
        assert_eq!(parsed.action, DecisionAction::Accept);
    }

    #[test]
    fn test_recent_ring_bounded() {
        let ledger = DecisionLedger::in_memory(3);
        for i in 0..5 {
            ledger
                .append(&record(&format!("1.{i}"), DecisionAction::Skip))
                .unwrap();
        }
        assert_eq!(ledger.recent_count(), 3);
        let recent = ledger.recent(10);
        assert_eq!(recent[0].market_id, MarketId::new("1.2"));
        assert_eq!(recent[2].market_id, MarketId::new("1.4"));
    }

    #[test]
    fn test_append_across_instances_preserves_history() {
        let dir = TempDir::new().unwrap();
        {
            let ledger = DecisionLedger::new(dir.path(), 10);
            ledger.append(&record("1.1", DecisionAction::Skip)).unwrap();
        }
        {
            let ledger = DecisionLedger::new(dir.path(), 10);
            ledger.append(&record("1.2", DecisionAction::Skip)).unwrap();
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        let file = File::open(entries[0].path()).unwrap();
        let lines: Vec<_> = BufReader::new(file).lines().map_while(|l| l.ok()).collect();
        assert_eq!(lines.len(), 2);
    }
}
