//! Chromium-rendered page fetcher.
//!
//! The listing site sits behind an anti-automation challenge that a plain
//! HTTP client cannot clear. This fetcher drives a headless Chromium over
//! CDP, waits for the challenge to resolve by polling for a readiness
//! selector, and returns the rendered DOM. The wait is bounded; a page that
//! never becomes ready surfaces as [`FetchError::NotReady`].

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::PageFetcher;

const DEFAULT_READY_SELECTOR: &str = "article, div.fp-snippet";

/// Headless-browser page fetcher.
pub struct BrowserFetcher {
    browser: Mutex<Option<Browser>>,
    ready_selector: String,
    wait: Duration,
    chrome_executable: Option<String>,
}

impl BrowserFetcher {
    /// Create a fetcher with the default readiness selector and a
    /// 30 second wait budget.
    pub fn new() -> Self {
        Self {
            browser: Mutex::new(None),
            ready_selector: DEFAULT_READY_SELECTOR.to_string(),
            wait: Duration::from_secs(30),
            chrome_executable: None,
        }
    }

    /// Override the selector that marks a page as ready.
    pub fn with_ready_selector(mut self, selector: impl Into<String>) -> Self {
        self.ready_selector = selector.into();
        self
    }

    /// Override the wait budget for challenge resolution.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Point at a specific Chrome/Chromium binary.
    pub fn with_chrome_executable(mut self, path: impl Into<String>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    async fn launch(&self) -> FetchResult<Browser> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| FetchError::Browser(e.into()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(Box::new(e)))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }
}

impl Default for BrowserFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            debug!("launching headless browser");
            *guard = Some(self.launch().await?);
        }
        let browser = guard.as_ref().ok_or_else(|| {
            FetchError::Browser("browser unavailable after launch".into())
        })?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(Box::new(e)))?;

        let result = async {
            page.goto(url)
                .await
                .map_err(|e| FetchError::Browser(Box::new(e)))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| FetchError::Browser(Box::new(e)))?;

            // Poll until the challenge clears and real content appears
            let deadline = Instant::now() + self.wait;
            loop {
                if page.find_element(self.ready_selector.as_str()).await.is_ok() {
                    break;
                }
                if Instant::now() >= deadline {
                    warn!(url = %url, "page never became ready");
                    return Err(FetchError::NotReady {
                        url: url.to_string(),
                        seconds: self.wait.as_secs(),
                    });
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }

            page.content()
                .await
                .map_err(|e| FetchError::Browser(Box::new(e)))
        }
        .await;

        let _ = page.close().await;
        result
    }
}
