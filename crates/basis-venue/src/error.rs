//! Venue error types.

use serde::Deserialize;
use thiserror::Error;

/// Binance error code for "No need to change margin type."
pub const MARGIN_TYPE_ALREADY_SET: &str = "-4046";

/// Binance error code for "Invalid API-key, IP, or permissions for action."
pub const INVALID_KEY_OR_PERMISSIONS: &str = "-2015";

/// Outcome of a failed venue call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VenueError {
    /// Network or connection failure; no response was received.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The venue answered with a non-success status.
    #[error("HTTP {status} venue error {code}: {msg}")]
    Api {
        status: u16,
        code: String,
        msg: String,
    },

    /// A signed call was attempted without complete credentials.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A success response whose body could not be interpreted.
    #[error("Decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    msg: Option<String>,
}

impl VenueError {
    /// Build an `Api` error from a non-success response body.
    ///
    /// Binance errors look like `{"code":-2015,"msg":"..."}`; anything
    /// else keeps the raw body as the message with code `unknown`.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let code = parsed
            .as_ref()
            .and_then(|b| b.code.as_ref())
            .map(|c| match c {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "unknown".to_string());
        let msg = parsed
            .and_then(|b| b.msg)
            .unwrap_or_else(|| body.trim().to_string());

        Self::Api { status, code, msg }
    }

    /// Venue error code, if this is an `Api` error.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Api { .. } => "api",
            Self::Validation(_) => "validation",
            Self::Decode(_) => "decode",
        }
    }
}

pub type VenueResult<T> = Result<T, VenueError>;
