//! Page fetching seam.

use async_trait::async_trait;

use crate::error::FetchResult;

/// Returns rendered HTML for a URL.
///
/// Implementations own the anti-automation story: waiting out interstitial
/// challenges is part of the contract, bounded by the implementation's wait
/// budget. A challenge that never clears surfaces as
/// [`FetchError::NotReady`](crate::error::FetchError::NotReady).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult<String>;
}
