//! Shared REST plumbing for the spot and futures clients.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{VenueError, VenueResult};
use crate::signer::{canonical_query, signed_query, Credentials, API_KEY_HEADER};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default `recvWindow` for signed requests (ms).
pub const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

/// Connection settings for one venue client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL without trailing slash (e.g., "https://api.binance.com").
    pub base_url: String,
    /// Credentials for signed endpoints. Public endpoints work without them.
    pub credentials: Option<Credentials>,
    pub recv_window_ms: u64,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_recv_window_ms(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }
}

/// Thin wrapper over `reqwest::Client` that knows how to sign and how to
/// turn venue answers into `VenueError`s.
pub(crate) struct RestClient {
    http: Client,
    config: ClientConfig,
}

impl RestClient {
    pub(crate) fn new(config: ClientConfig) -> VenueResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VenueError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Unsigned GET.
    pub(crate) async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> VenueResult<T> {
        let owned: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let url = if owned.is_empty() {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}{}?{}", self.config.base_url, path, canonical_query(&owned))
        };

        debug!(%url, "GET");
        self.execute(self.http.get(url)).await
    }

    /// Signed request. Parameters travel in the query string.
    pub(crate) async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: Vec<(String, String)>,
    ) -> VenueResult<T> {
        let credentials = self.config.credentials.as_ref();
        let query = signed_query(
            credentials,
            params,
            self.config.recv_window_ms,
            chrono::Utc::now().timestamp_millis(),
        )?;
        // signed_query only succeeds with complete credentials
        let api_key = credentials.map(|c| c.api_key()).unwrap_or_default();

        debug!(%method, path, "Signed request");
        let url = format!("{}{}?{}", self.config.base_url, path, query);
        let request = self
            .http
            .request(method, url)
            .header(API_KEY_HEADER, api_key);
        self.execute(request).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> VenueResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| VenueError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VenueError::Transport(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(VenueError::from_response(status.as_u16(), &body));
        }

        trace!(%status, body_len = body.len(), "Response received");
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body)
            .map_err(|e| VenueError::Decode(format!("Failed to parse response: {e}")))
    }
}
