//! Storage trait seams.
//!
//! Status moves happen through compare-and-set operations that take effect
//! only when the record is in the stage's admissible states. A `None` return
//! from a `begin_*` call means the precondition did not hold and the caller
//! must treat the task as already handled (queue redelivery is at-least-once).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::job::{
    JobAdvertisement, LanguageRequirement, NewJobAdvertisement, NewLanguageRequirement,
    Organization,
};
use crate::types::record::{CrawlCursor, IngestionRecord, PageDetails, RecordStatusView};

/// Ingestion record and crawl cursor persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a pending record unless one already exists for its post
    /// number. Returns whether a row was created.
    async fn create_record_if_absent(&self, record: &IngestionRecord) -> Result<bool>;

    async fn get_record(&self, id: Uuid) -> Result<Option<IngestionRecord>>;

    async fn find_record_by_post_number(
        &self,
        post_number: &str,
    ) -> Result<Option<IngestionRecord>>;

    /// CAS entry for the download stage: `pending|downloading → downloading`,
    /// bumping the attempt counter and stamping the attempt time. Returns
    /// the updated record, or `None` when the record is past this stage.
    async fn begin_download(&self, id: Uuid) -> Result<Option<IngestionRecord>>;

    /// CAS completion for the download stage: `downloading → downloaded`,
    /// storing normalized content and parsed page fields, clearing the
    /// error, and resetting the attempt counter for the next stage.
    async fn complete_download(&self, id: Uuid, details: &PageDetails) -> Result<()>;

    /// CAS entry for the extraction stage: `downloaded|processing →
    /// processing` provided no advertisement is linked yet, bumping the
    /// attempt counter. Returns `None` when the precondition fails.
    async fn begin_extraction(&self, id: Uuid) -> Result<Option<IngestionRecord>>;

    /// Persist a stage failure. When `terminal` the record moves to
    /// `failed`; otherwise only the error message is recorded.
    async fn record_stage_error(&self, id: Uuid, error: &str, terminal: bool) -> Result<()>;

    /// Move a duplicate record to the terminal `skipped` status.
    async fn mark_skipped(&self, id: Uuid) -> Result<()>;

    async fn get_cursor(&self, source: &str) -> Result<Option<CrawlCursor>>;

    /// Advance the cursor to the newest post number seen, stamping the
    /// crawl time, adding to the discovery total, and clearing any error.
    async fn advance_cursor(
        &self,
        source: &str,
        last_post_number: &str,
        newly_discovered: i64,
    ) -> Result<()>;

    /// Record a discovery failure on the cursor row without moving it.
    async fn record_crawl_error(&self, source: &str, error: &str) -> Result<()>;

    /// Operational view over all records.
    async fn list_statuses(&self) -> Result<Vec<RecordStatusView>>;
}

/// Organization and advertisement persistence.
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Race-safe lookup-or-create by exact name.
    async fn get_or_create_organization(
        &self,
        name: &str,
        abbreviation: Option<&str>,
    ) -> Result<Organization>;

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>>;

    async fn get_advertisement(&self, id: Uuid) -> Result<Option<JobAdvertisement>>;

    async fn find_advertisement_by_post_number(
        &self,
        post_number: &str,
    ) -> Result<Option<JobAdvertisement>>;

    /// All advertisements, for full index rebuilds.
    async fn list_advertisements(&self) -> Result<Vec<JobAdvertisement>>;

    /// Create an advertisement with its language requirements, link it to
    /// the ingestion record, and mark the record `processed`, atomically.
    /// If the record is already linked, returns the existing advertisement
    /// and creates nothing.
    async fn create_advertisement(
        &self,
        record_id: Uuid,
        ad: NewJobAdvertisement,
        languages: Vec<NewLanguageRequirement>,
    ) -> Result<JobAdvertisement>;

    async fn get_language_requirements(
        &self,
        advertisement_id: Uuid,
    ) -> Result<Vec<LanguageRequirement>>;
}

/// Combined storage surface the pipeline runs against.
pub trait PipelineStore: RecordStore + DomainStore {}

impl<T: RecordStore + DomainStore> PipelineStore for T {}
