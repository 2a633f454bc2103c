//! Persistence error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The state file belongs to a different symbol than the one configured.
    #[error("State file holds {found}, configured symbol is {expected}")]
    SymbolMismatch { expected: String, found: String },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
