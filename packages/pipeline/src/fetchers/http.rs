//! Plain HTTP fetcher using reqwest.
//!
//! Sends browser-like headers and spaces requests out with a politeness
//! limiter. Sufficient for pages served without a JavaScript challenge;
//! challenge-protected pages need the browser fetcher.

use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::PageFetcher;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP page fetcher with rate limiting.
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
}

impl HttpFetcher {
    /// Create a fetcher with the default politeness delay (2 seconds
    /// between requests).
    pub fn new() -> FetchResult<Self> {
        Self::with_delay(Duration::from_secs(2))
    }

    /// Create a fetcher with a custom delay between requests.
    pub fn with_delay(delay: Duration) -> FetchResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                .parse()
                .map_err(|_| FetchError::Http("invalid header value".into()))?,
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "en-US,en;q=0.5"
                .parse()
                .map_err(|_| FetchError::Http("invalid header value".into()))?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Http(e.to_string().into()))?;

        let quota = Quota::with_period(delay).unwrap_or_else(|| Quota::per_second(nonzero!(1u32)));
        Ok(Self {
            client,
            limiter: RateLimiter::direct(quota),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string().into()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Http(e.to_string().into()))
    }
}
