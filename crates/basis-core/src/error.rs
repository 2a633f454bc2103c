//! Error types for basis-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid strategy mode: {0}")]
    InvalidMode(String),
}
