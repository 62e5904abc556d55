//! Page fetcher implementations.

pub mod http;
pub mod mock;

#[cfg(feature = "browser")]
pub mod browser;

pub use http::HttpFetcher;
pub use mock::MockFetcher;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
