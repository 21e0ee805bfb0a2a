//! Catalogue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Session rejected by account API: {0}")]
    SessionRejected(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

pub type CatalogueResult<T> = Result<T, CatalogueError>;
