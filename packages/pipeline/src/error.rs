//! Typed errors for the ingestion pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Page fetch failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// AI service unavailable or returned garbage
    #[error("AI service error: {0}")]
    Ai(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Task queue operation failed
    #[error("queue error: {0}")]
    Queue(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Search index operation failed
    #[error("search index error: {0}")]
    Search(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Ingestion record does not exist
    #[error("ingestion record not found: {id}")]
    RecordNotFound { id: Uuid },

    /// Listing page could not be parsed
    #[error("listing parse error: {reason}")]
    ListingParse { reason: String },

    /// Posting page could not be parsed
    #[error("posting parse error for {url}: {reason}")]
    PostingParse { url: String, reason: String },

    /// Extracted data failed validation
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success HTTP status
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Page never became ready within the wait budget
    /// (typically an uncleared anti-automation challenge)
    #[error("page not ready after {seconds}s: {url}")]
    NotReady { url: String, seconds: u64 },

    /// Browser automation failure
    #[error("browser error: {0}")]
    Browser(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
