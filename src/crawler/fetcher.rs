//! HTTP fetcher with rate limiting and browser-like headers
//!
//! This module provides the single outbound-request primitive used by every
//! data source:
//! - One GET per call, no retries
//! - Per-request timeout (30s unless configured otherwise)
//! - Client-side rate limiting with governor
//! - User-Agent rotation over desktop browser strings
//! - Base URL override for tests against mock servers

use crate::config::Config;
use crate::utils::error::FetchError;
use crate::utils::truncate_text;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT},
    Client, StatusCode,
};
use std::num::NonZeroU32;
use std::time::Duration;

/// Pool of realistic User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Longest error body kept in `FetchError::HttpStatus`
const MAX_ERROR_BODY: usize = 500;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound HTTP fetcher shared by all sources
pub struct HttpFetcher {
    /// HTTP client with compression enabled
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Default timeout applied to each request
    timeout: Duration,

    /// Fixed User-Agent overriding rotation
    user_agent: Option<String>,

    /// Optional base URL override for testing with mock servers
    base_url: Option<String>,
}

impl HttpFetcher {
    /// Create a new fetcher with default settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Client` if the HTTP client cannot be created
    pub fn new(requests_per_second: u32) -> Result<Self, FetchError> {
        Self::with_config(requests_per_second, DEFAULT_TIMEOUT)
    }

    /// Create a new fetcher with a custom timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Client` if the HTTP client cannot be created
    pub fn with_config(requests_per_second: u32, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().gzip(true).build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            timeout,
            user_agent: None,
            base_url: None,
        })
    }

    /// Build from application configuration
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let mut fetcher =
            Self::with_config(config.fetch.requests_per_second, config.request_timeout())?;
        fetcher.user_agent = config.fetch.user_agent.clone();
        Ok(fetcher)
    }

    /// Create a new fetcher with a custom base URL for testing
    ///
    /// Relative URLs passed to [`fetch_text`](Self::fetch_text) are appended
    /// to `base_url`.
    pub fn with_base_url(base_url: &str, requests_per_second: u32) -> Result<Self, FetchError> {
        let mut fetcher = Self::new(requests_per_second)?;
        fetcher.base_url = Some(base_url.trim_end_matches('/').to_string());
        Ok(fetcher)
    }

    /// Default per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch `url` and return the body on HTTP 200
    ///
    /// # Errors
    ///
    /// - `FetchError::Network` when the connection fails
    /// - `FetchError::Timeout` when no response arrives in time
    /// - `FetchError::HttpStatus` for any status other than 200
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.fetch_text_with_timeout(url, self.timeout).await
    }

    /// Same as [`fetch_text`](Self::fetch_text) with an explicit timeout
    pub async fn fetch_text_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let full_url = self.resolve(url)?;
        tracing::debug!(url = %full_url, "Fetching URL");

        let response = self
            .client
            .get(full_url)
            .headers(self.build_headers())
            .timeout(timeout)
            .send()
            .await
            .map_err(FetchError::from_request)?;

        let status = response.status();
        let body = response.text().await.map_err(FetchError::from_request)?;

        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus {
                code: status.as_u16(),
                body: truncate_text(&body, MAX_ERROR_BODY),
            });
        }

        Ok(body)
    }

    /// Apply the base URL override and validate
    fn resolve(&self, url: &str) -> Result<url::Url, FetchError> {
        let full = match &self.base_url {
            Some(base) if !url.starts_with("http://") && !url.starts_with("https://") => {
                format!("{base}{url}")
            }
            _ => url.to_string(),
        };

        url::Url::parse(&full).map_err(|e| FetchError::InvalidUrl(format!("{full}: {e}")))
    }

    /// Build browser-like request headers
    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let agent = self
            .user_agent
            .as_deref()
            .and_then(|ua| HeaderValue::from_str(ua).ok())
            .unwrap_or_else(|| HeaderValue::from_static(self.random_user_agent()));
        headers.insert(USER_AGENT, agent);

        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/json,text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        headers
    }

    /// Get a random user agent from the pool
    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0])
    }
}
