//! The ingestion pipeline: discovery plus the two processing stages.
//!
//! All collaborators are injected as trait objects, so the same pipeline
//! runs against Postgres and Elasticsearch in production and against the
//! in-memory fakes in tests. Stage-level setbacks (a fetch that will be
//! retried, a record that went terminal) are ordinary outcomes, not
//! errors; `Err` from a stage means the stage itself could not run.

pub mod content;
pub mod discovery;
pub mod download;
pub mod extract;
pub mod prompts;
pub mod sync;

pub use discovery::DiscoveryReport;
pub use download::DownloadOutcome;
pub use extract::ExtractOutcome;

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::traits::extractor::ExtractionClient;
use crate::traits::fetcher::PageFetcher;
use crate::traits::queue::TaskQueue;
use crate::traits::searcher::SearchIndex;
use crate::traits::store::PipelineStore;

/// Pipeline over injected storage, fetch, extraction, queue, and index
/// collaborators.
pub struct Pipeline {
    store: Arc<dyn PipelineStore>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ExtractionClient>,
    index: Arc<dyn SearchIndex>,
    queue: Arc<dyn TaskQueue>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ExtractionClient>,
        index: Arc<dyn SearchIndex>,
        queue: Arc<dyn TaskQueue>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            extractor,
            index,
            queue,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn PipelineStore {
        self.store.as_ref()
    }

    pub(crate) fn fetcher(&self) -> &dyn PageFetcher {
        self.fetcher.as_ref()
    }

    pub(crate) fn extractor(&self) -> &dyn ExtractionClient {
        self.extractor.as_ref()
    }

    pub(crate) fn index(&self) -> &dyn SearchIndex {
        self.index.as_ref()
    }

    pub(crate) fn queue(&self) -> &dyn TaskQueue {
        self.queue.as_ref()
    }
}
