//! Executor error types.

use basis_venue::VenueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// No quantity both venues accept.
    #[error("Sizing error: {0}")]
    Sizing(String),

    #[error(transparent)]
    Venue(#[from] VenueError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
