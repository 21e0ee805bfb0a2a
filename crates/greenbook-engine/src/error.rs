//! Engine error types.

use greenbook_core::EngineMode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid transition: {requested} from {from}")]
    InvalidTransition {
        from: EngineMode,
        requested: String,
    },

    #[error("Engine command channel closed")]
    ChannelClosed,

    #[error("Persistence error: {0}")]
    Persistence(#[from] greenbook_persistence::PersistenceError),
}

pub type EngineResult<T> = Result<T, EngineError>;
