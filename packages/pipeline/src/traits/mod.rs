//! Core trait abstractions.

pub mod extractor;
pub mod fetcher;
pub mod queue;
pub mod searcher;
pub mod store;

pub use extractor::ExtractionClient;
pub use fetcher::PageFetcher;
pub use queue::{ClaimedTask, Task, TaskQueue};
pub use searcher::SearchIndex;
pub use store::{DomainStore, PipelineStore, RecordStore};
