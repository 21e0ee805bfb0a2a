//! Strategy plugins and the evaluation pipeline.
//!
//! A plugin is a pure function of its inputs so that replay from the
//! decision ledger is deterministic. The pipeline evaluates enabled
//! plugins in ascending priority order; the first ACCEPT with candidates
//! wins, but every evaluation is reported for the ledger.

pub mod drift;
pub mod pipeline;
pub mod plugin;
pub mod tiered_lay;

pub use drift::DriftMonitor;
pub use pipeline::{PipelineOutcome, PluginPipeline};
pub use plugin::{Evaluation, EvaluationInput, StrategyPlugin};
pub use tiered_lay::{TieredLayConfig, TieredLayStrategy};
