//! Execution error types.
//!
//! Placement failures are reported through `BetOutcome`, never raised;
//! this error covers construction problems only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub type ExecResult<T> = Result<T, ExecError>;
