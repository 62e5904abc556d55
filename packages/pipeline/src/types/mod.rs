//! Domain data types.

pub mod document;
pub mod extraction;
pub mod job;
pub mod record;

pub use document::{LanguageRequirementDoc, OrganizationDoc, SearchDocument};
pub use extraction::{parse_extraction_response, ExtractedJob, ExtractedLanguage};
pub use job::{
    ContractType, JobAdvertisement, LanguageRequirement, NewJobAdvertisement,
    NewLanguageRequirement, Organization, PositionLevel, ProficiencyLevel, RequirementLevel,
    WorkArrangement,
};
pub use record::{
    CrawlCursor, IngestionRecord, PageDetails, PostingSummary, RecordStatus, RecordStatusView,
};
