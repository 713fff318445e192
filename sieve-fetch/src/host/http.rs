//! HTTP fetcher built on `reqwest`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sieve_core::ContentKind;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::target::{FetchTarget, RawResponse};

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// User agent string for sieve.
pub const USER_AGENT: &str = concat!("sieve/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Fetcher
// ============================================================================

/// Fetches targets over HTTP(S) with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    inner: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with default settings.
    pub fn new() -> Result<Self, FetchError> {
        Self::builder().build()
    }

    /// Starts building a fetcher.
    pub fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::default()
    }

    /// Returns the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

/// Builder for [`HttpFetcher`].
#[derive(Debug, Clone, Default)]
pub struct HttpFetcherBuilder {
    user_agent: Option<String>,
    headers: BTreeMap<String, String>,
    connect_timeout: Option<Duration>,
}

impl HttpFetcherBuilder {
    /// Overrides the user agent.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the fetcher.
    pub fn build(self) -> Result<HttpFetcher, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidTarget(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidTarget(format!("header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let inner = Client::builder()
            .user_agent(self.user_agent.as_deref().unwrap_or(USER_AGENT))
            .default_headers(headers)
            .connect_timeout(
                self.connect_timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)),
            )
            .build()?;

        Ok(HttpFetcher { inner })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, target), fields(url = %target.url))]
    async fn fetch(
        &self,
        target: &FetchTarget,
        timeout: Duration,
    ) -> Result<RawResponse, FetchError> {
        debug!("GET request");

        let mut request = self.inner.get(target.url.clone()).timeout(timeout);
        for (name, value) in &target.headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();
        let url = response.url().clone();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| classify(e, timeout))?
            .to_vec();
        debug!(status, bytes = body.len(), "Response received");

        let content_kind =
            ContentKind::detect(headers.get("content-type").map(String::as_str), &body);
        Ok(RawResponse {
            url,
            status,
            headers,
            body,
            content_kind,
        })
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Request(error)
    }
}

// ============================================================================
// Tests
// ============================================================================
