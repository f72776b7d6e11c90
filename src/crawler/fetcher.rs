//! HTTP fetcher
//!
//! This module issues the actual GET requests for the crawler:
//! - Building the HTTP client with timeouts and a cookie store
//! - Enforcing a minimum delay between consecutive requests (politeness)
//! - Mapping transport failures and status codes onto the error taxonomy

use crate::config::CrawlerConfig;
use crate::{CrawlError, Result};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};

/// Per-request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Builds the HTTP client used for all thread-page requests
///
/// The cookie store keeps Cloudflare clearance cookies across requests
/// within a crawl; a challenge the client cannot pass still surfaces as a
/// 403 and is mapped to [`CrawlError::CloudflareBlocked`] by [`Fetcher::fetch`].
pub fn build_http_client(config: &CrawlerConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Throttled HTTP fetcher
///
/// The throttle clock is per-instance state: it is advanced only by calls
/// that actually reach the network, so cache hits handled upstream never
/// reset it, and separate fetchers throttle independently.
pub struct Fetcher {
    client: Client,
    delay: Duration,
    last_request_at: Option<Instant>,
}

impl Fetcher {
    /// Creates a fetcher from the crawler configuration
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = build_http_client(config)?;
        let delay = if config.delay > 0.0 {
            Duration::from_secs_f64(config.delay)
        } else {
            Duration::ZERO
        };

        Ok(Self {
            client,
            delay,
            last_request_at: None,
        })
    }

    /// Fetches the body of `url`
    ///
    /// Blocks (asynchronously) until the politeness delay since the last
    /// network call has elapsed, then issues one GET.
    ///
    /// # Errors
    ///
    /// * [`CrawlError::ThreadNotFound`] - server returned 404
    /// * [`CrawlError::CloudflareBlocked`] - server returned 403
    /// * [`CrawlError::Http`] - any other status >= 400
    /// * [`CrawlError::Network`] - DNS, connection, or timeout failure
    pub async fn fetch(&mut self, url: &str) -> Result<String> {
        self.throttle().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, url))?;
        self.last_request_at = Some(Instant::now());

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CrawlError::ThreadNotFound {
                url: url.to_string(),
            });
        }
        if status == StatusCode::FORBIDDEN {
            return Err(CrawlError::CloudflareBlocked {
                url: url.to_string(),
            });
        }
        if status.as_u16() >= 400 {
            return Err(CrawlError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| CrawlError::Network {
            url: url.to_string(),
            message: format!("failed to read response body: {e}"),
        })
    }

    /// Sleeps until the configured delay since the last request has passed
    async fn throttle(&self) {
        if self.delay.is_zero() {
            return;
        }
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                tracing::debug!("Throttling for {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Maps a reqwest transport error onto [`CrawlError::Network`]
fn classify_transport_error(error: reqwest::Error, url: &str) -> CrawlError {
    let message = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    };

    CrawlError::Network {
        url: url.to_string(),
        message,
    }
}
