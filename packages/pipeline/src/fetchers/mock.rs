//! Scripted fetcher for tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::PageFetcher;

/// Fetcher that serves pre-registered pages and can be scripted to fail.
#[derive(Default)]
pub struct MockFetcher {
    pages: RwLock<HashMap<String, String>>,
    failures: RwLock<HashMap<String, u32>>,
    calls: RwLock<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the HTML returned for a URL.
    pub fn add_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.write().unwrap().insert(url.into(), html.into());
    }

    /// Make the next `count` fetches of `url` fail with HTTP 503.
    pub fn fail_next(&self, url: impl Into<String>, count: u32) {
        self.failures.write().unwrap().insert(url.into(), count);
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        self.calls.write().unwrap().push(url.to_string());

        {
            let mut failures = self.failures.write().unwrap();
            if let Some(remaining) = failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Status {
                        status: 503,
                        url: url.to_string(),
                    });
                }
            }
        }

        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}
