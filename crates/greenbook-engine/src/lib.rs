//! The automated betting engine.
//!
//! A single long-lived task owns all engine state. Operator commands
//! are queued and applied between scan cycles so a cycle never acts
//! under a mode that changed mid-flight. Each cycle reads price
//! snapshots, joins catalogue metadata, runs the plugin pipeline,
//! enforces risk limits, and records every evaluation in the ledger.

pub mod activity;
pub mod command;
pub mod context;
pub mod engine;
pub mod error;
pub mod status;

pub use activity::{ActivityEntry, ActivityKind, ActivityTrail};
pub use command::{EngineCommand, EngineHandle};
pub use engine::{Engine, EngineDeps, EngineTask, DEFAULT_SCAN_INTERVAL};
pub use error::{EngineError, EngineResult};
pub use status::{EngineCounters, EngineStatus};
