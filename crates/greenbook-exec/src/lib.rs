//! Bet execution.
//!
//! Both execution paths expose one contract, so the engine branches on
//! mode only when choosing which implementation to call. The staging
//! recorder always succeeds locally; the order executor performs one
//! idempotent external placement call and reports failure instead of
//! raising it. Neither retries: a failed placement is terminal for that
//! candidate in that cycle.

pub mod error;
pub mod executor;
pub mod rest;
pub mod staging;

pub use error::{ExecError, ExecResult};
pub use executor::BetExecutor;
pub use rest::{OrderApiConfig, RestOrderExecutor};
pub use staging::StagingRecorder;
