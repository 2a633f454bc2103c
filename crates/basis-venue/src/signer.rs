//! HMAC-SHA256 request signing.
//!
//! Signed endpoints take the full query string (including `recvWindow`
//! and `timestamp`), sign it with the API secret, and append the hex
//! digest as `signature`. The API key travels in `X-MBX-APIKEY`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{VenueError, VenueResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key on signed requests.
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// API key and secret for one venue.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Zeroizing::new(api_secret.into()),
        }
    }

    /// Both key and secret are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Hex HMAC-SHA256 of `payload` keyed with the API secret.
    pub fn sign(&self, payload: &str) -> VenueResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| VenueError::Validation(format!("invalid API secret: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

fn redact(key: &str) -> String {
    match key.get(..4) {
        Some(prefix) if key.len() > 8 => format!("{prefix}..."),
        _ => "<redacted>".to_string(),
    }
}

/// Build a signed query string: `params&recvWindow=..&timestamp=..&signature=..`.
///
/// Fails with `Validation` before any I/O when credentials are missing.
pub fn signed_query(
    credentials: Option<&Credentials>,
    mut params: Vec<(String, String)>,
    recv_window_ms: u64,
    timestamp_ms: i64,
) -> VenueResult<String> {
    let credentials = credentials
        .filter(|c| c.is_complete())
        .ok_or_else(|| {
            VenueError::Validation("signed endpoint requires api_key and api_secret".to_string())
        })?;

    params.push(("recvWindow".to_string(), recv_window_ms.to_string()));
    params.push(("timestamp".to_string(), timestamp_ms.to_string()));

    let query = canonical_query(&params);
    let signature = credentials.sign(&query)?;
    Ok(format!("{query}&signature={signature}"))
}

/// `k=v&k=v` in the given order, percent-encoding anything outside the
/// unreserved set.
pub fn canonical_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(raw: &str) -> String {
    raw.bytes()
        .map(|b| {
            let c = b as char;
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
                c.to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect()
}
