//! Cover Art Fetcher using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{Artwork, ArtworkFetcher},
};
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

/// Upper bound on a downloaded cover image.
pub const DEFAULT_MAX_ARTWORK_BYTES: usize = 8 * 1024 * 1024;

/// Retry behaviour for artwork downloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff before attempt `attempt + 1`.
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Reqwest-based [`ArtworkFetcher`].
///
/// Only `http` and `https` URLs are fetched. Server errors and rate limiting
/// are retried with exponential backoff; everything else fails immediately.
pub struct HttpArtworkFetcher {
    client: Client,
    policy: RetryPolicy,
    max_bytes: usize,
}

impl HttpArtworkFetcher {
    /// Create a fetcher with default timeouts.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(15))
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("media-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self::with_client(client))
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
            max_bytes: DEFAULT_MAX_ARTWORK_BYTES,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn parse_url(raw: &str) -> Result<Url> {
        let url = Url::parse(raw)
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid cover URL: {}", e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(BridgeError::OperationFailed(format!(
                "Unsupported cover URL scheme: {}",
                scheme
            ))),
        }
    }

    async fn fetch_once(&self, url: &Url) -> std::result::Result<Artwork, Attempt> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                Attempt::Retry(BridgeError::OperationFailed("Request timed out".to_string()))
            } else if e.is_connect() {
                Attempt::Retry(BridgeError::OperationFailed(format!(
                    "Connection failed: {}",
                    e
                )))
            } else {
                Attempt::Fatal(BridgeError::OperationFailed(e.to_string()))
            }
        })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(Attempt::Retry(BridgeError::OperationFailed(format!(
                "HTTP {} error",
                status.as_u16()
            ))));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(BridgeError::OperationFailed(format!(
                "HTTP error: {}",
                status
            ))));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(Attempt::Fatal(too_large(length as usize, self.max_bytes)));
            }
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| Attempt::Retry(BridgeError::OperationFailed(e.to_string())))?;
        if body.len() > self.max_bytes {
            return Err(Attempt::Fatal(too_large(body.len(), self.max_bytes)));
        }

        Ok(Artwork::new(body, mime_type))
    }
}

enum Attempt {
    Retry(BridgeError),
    Fatal(BridgeError),
}

fn too_large(size: usize, limit: usize) -> BridgeError {
    BridgeError::OperationFailed(format!(
        "Cover image too large: {} bytes (limit {})",
        size, limit
    ))
}

#[async_trait]
impl ArtworkFetcher for HttpArtworkFetcher {
    async fn fetch(&self, raw_url: &str) -> Result<Artwork> {
        let url = Self::parse_url(raw_url)?;
        let host = url.host_str().unwrap_or_default().to_string();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, host = %host, "Fetching cover art");

            match self.fetch_once(&url).await {
                Ok(artwork) => return Ok(artwork),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) if attempt >= self.policy.max_attempts => return Err(e),
                Err(Attempt::Retry(e)) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(attempt, host = %host, error = %e, delay_ms = delay.as_millis() as u64, "Cover art fetch failed, retrying");
                    sleep(delay).await;
                }
            }
        }
    }
}
