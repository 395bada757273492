// src/fetch/http.rs
// =============================================================================
// Fetches pages over HTTP with reqwest.
//
// Key functionality:
// - One Client for the whole process (connection pooling, shared cookies)
// - Bounded per-request timeout
// - Any non-2xx response is a FetchError, never a half-read body
// =============================================================================

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::Fetcher;
use crate::error::{ConfigError, FetchError};

// Idle pool settings for the shared client
const MAX_IDLE_PER_HOST: usize = 15;
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed Fetcher with its own cookie jar.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                name: "fetch client",
                reason: e.to_string(),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, base_url: &str, reference: &str) -> Result<String, FetchError> {
        let url = page_url(base_url, reference)?;

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/html; charset=utf-8")
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "request failed");
                FetchError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "non-success response");
            return Err(FetchError::Status(status.as_u16()));
        }

        debug!(url = %url, status = status.as_u16(), "received page");
        Ok(response.text().await?)
    }
}

// Joins the chain's fixed origin with a page reference
//
// Examples:
//   ("https://www.youtube.com", "/watch?v=abc") -> https://www.youtube.com/watch?v=abc
//   ("http://127.0.0.1:8000", "r1")            -> http://127.0.0.1:8000/r1
fn page_url(base_url: &str, reference: &str) -> Result<Url, FetchError> {
    let base = Url::parse(base_url).map_err(|_| FetchError::InvalidUrl(base_url.to_string()))?;
    base.join(reference)
        .map_err(|_| FetchError::InvalidUrl(format!("{}{}", base_url, reference)))
}
