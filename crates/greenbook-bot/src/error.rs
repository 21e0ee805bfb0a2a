//! Application-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] greenbook_persistence::PersistenceError),

    #[error("Catalogue error: {0}")]
    Catalogue(#[from] greenbook_catalogue::CatalogueError),

    #[error("Executor error: {0}")]
    Exec(#[from] greenbook_exec::ExecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
