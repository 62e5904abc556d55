//! Ingestion records and crawl state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an ingestion record.
///
/// `Pending → Downloading → Downloaded → Processing → Processed`, with
/// `Failed` (attempt exhaustion in either stage) and `Skipped` (duplicate
/// posting) as terminal exits. No transition moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Downloading,
    Downloaded,
    Processing,
    Processed,
    Failed,
    Skipped,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Downloading => "downloading",
            RecordStatus::Downloaded => "downloaded",
            RecordStatus::Processing => "processing",
            RecordStatus::Processed => "processed",
            RecordStatus::Failed => "failed",
            RecordStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecordStatus::Pending),
            "downloading" => Some(RecordStatus::Downloading),
            "downloaded" => Some(RecordStatus::Downloaded),
            "processing" => Some(RecordStatus::Processing),
            "processed" => Some(RecordStatus::Processed),
            "failed" => Some(RecordStatus::Failed),
            "skipped" => Some(RecordStatus::Skipped),
            _ => None,
        }
    }

    /// Terminal statuses are never left.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecordStatus::Processed | RecordStatus::Failed | RecordStatus::Skipped
        )
    }

    /// Whether `next` is a legal forward move from this status.
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        match (self, next) {
            (Pending, Downloading) => true,
            (Downloading, Downloaded) | (Downloading, Failed) | (Downloading, Skipped) => true,
            (Downloaded, Processing) => true,
            (Processing, Processed) | (Processing, Failed) => true,
            // Re-claiming an in-flight stage is a self-move, not a regression
            (Downloading, Downloading) | (Processing, Processing) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per external posting, created by discovery and advanced by the
/// two processing stages. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRecord {
    pub id: Uuid,
    /// Source-assigned identifier, unique per posting
    pub post_number: String,
    pub source_url: String,
    /// Title as seen on the posting page (filled at download)
    pub post_name: Option<String>,
    /// Category fields parsed from the posting page, used as
    /// extraction fallbacks
    pub organization_name: Option<String>,
    pub location_country: Option<String>,
    pub location_city: Option<String>,
    /// Normalized markdown content (filled at download)
    pub content: Option<String>,
    pub status: RecordStatus,
    /// Stage executions started; reset between stages
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Set exactly once, when extraction succeeds
    pub job_advertisement_id: Option<Uuid>,
    pub discovered_at: DateTime<Utc>,
}

impl IngestionRecord {
    /// Create a fresh pending record for a discovered posting.
    pub fn new(post_number: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_number: post_number.into(),
            source_url: source_url.into(),
            post_name: None,
            organization_name: None,
            location_country: None,
            location_city: None,
            content: None,
            status: RecordStatus::Pending,
            attempts: 0,
            last_error: None,
            last_attempt_at: None,
            job_advertisement_id: None,
            discovered_at: Utc::now(),
        }
    }

    /// Attach the title seen on the listing page.
    pub fn with_post_name(mut self, post_name: impl Into<String>) -> Self {
        self.post_name = Some(post_name.into());
        self
    }
}

/// A posting summary parsed from the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingSummary {
    pub post_number: String,
    pub url: String,
    pub title: String,
}

/// Fields parsed from a posting page during the download stage.
#[derive(Debug, Clone)]
pub struct PageDetails {
    pub title: String,
    pub content_markdown: String,
    pub organization_name: Option<String>,
    pub location_country: Option<String>,
    pub location_city: Option<String>,
}

/// Persisted crawl position for one source.
#[derive(Debug, Clone)]
pub struct CrawlCursor {
    pub source: String,
    /// Newest post number seen by a completed discovery run
    pub last_post_number: Option<String>,
    pub last_crawl_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub total_discovered: i64,
}

impl CrawlCursor {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            last_post_number: None,
            last_crawl_at: None,
            last_error: None,
            total_discovered: 0,
        }
    }
}

/// Operational read model: one line per record for dashboards and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct RecordStatusView {
    pub post_number: String,
    pub status: RecordStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}
