//! Session and plugin descriptor persistence.
//!
//! Whole-file JSON, replaced atomically via temp-file rename. The
//! session file carries mode, counters, and risk settings so the engine
//! picks up where it left off after a restart; descriptors carry the
//! operator's enabled flags and priorities independently of deploys.

use crate::error::PersistenceResult;
use greenbook_core::{PluginDescriptor, SessionRecord};
use std::path::PathBuf;
use tracing::{info, warn};

pub struct SessionStore {
    session_path: Option<PathBuf>,
    plugins_path: Option<PathBuf>,
}

impl SessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let dir: PathBuf = data_dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            session_path: Some(dir.join("session.json")),
            plugins_path: Some(dir.join("plugins.json")),
        })
    }

    /// Memory-only store for tests; loads return defaults.
    pub fn in_memory() -> Self {
        Self {
            session_path: None,
            plugins_path: None,
        }
    }

    /// Load the persisted session, falling back to defaults when the
    /// file is missing or unreadable. A corrupt session must not keep
    /// the engine from starting.
    pub fn load_session(&self) -> SessionRecord {
        let Some(path) = &self.session_path else {
            return SessionRecord::default();
        };
        if !path.exists() {
            return SessionRecord::default();
        }
        match load_json::<SessionRecord>(path) {
            Ok(record) => {
                info!(mode = %record.mode, "Loaded persisted session");
                record
            }
            Err(e) => {
                warn!(error = %e, "Failed to load session, starting fresh");
                SessionRecord::default()
            }
        }
    }

    pub fn save_session(&self, record: &SessionRecord) -> PersistenceResult<()> {
        let Some(path) = &self.session_path else {
            return Ok(());
        };
        write_atomic(path, &serde_json::to_string_pretty(record)?)
    }

    pub fn load_descriptors(&self) -> Vec<PluginDescriptor> {
        let Some(path) = &self.plugins_path else {
            return Vec::new();
        };
        if !path.exists() {
            return Vec::new();
        }
        match load_json::<Vec<PluginDescriptor>>(path) {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Failed to load plugin descriptors");
                Vec::new()
            }
        }
    }

    pub fn save_descriptors(&self, descriptors: &[PluginDescriptor]) -> PersistenceResult<()> {
        let Some(path) = &self.plugins_path else {
            return Ok(());
        };
        write_atomic(path, &serde_json::to_string_pretty(descriptors)?)
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, String> {
    let data = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&data).map_err(|e| e.to_string())
}

fn write_atomic(path: &PathBuf, contents: &str) -> PersistenceResult<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenbook_core::EngineMode;
    use tempfile::TempDir;

    #[test]
    fn test_session_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let mut record = SessionRecord::default();
        record.mode = EngineMode::Staging;
        record.bets_placed_today = 3;
        store.save_session(&record).unwrap();

        let loaded = store.load_session();
        assert_eq!(loaded.mode, EngineMode::Staging);
        assert_eq!(loaded.bets_placed_today, 3);
    }

    #[test]
    fn test_missing_session_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let loaded = store.load_session();
        assert_eq!(loaded.mode, EngineMode::Stopped);
    }

    #[test]
    fn test_corrupt_session_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("session.json"), "{not json").unwrap();
        let loaded = store.load_session();
        assert_eq!(loaded.mode, EngineMode::Stopped);
    }

    #[test]
    fn test_descriptor_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let mut descriptor = PluginDescriptor::new("tiered_lay_v1", "Tiered Lay", "1.0.0");
        descriptor.enabled = false;
        store.save_descriptors(&[descriptor]).unwrap();

        let loaded = store.load_descriptors();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].enabled);
    }
}
