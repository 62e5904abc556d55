//! Test harness wiring the pipeline to in-memory collaborators.
//!
//! Used by the integration tests and available to downstream crates that
//! want to exercise pipeline behavior without Postgres, Elasticsearch,
//! or an LLM.

use std::sync::Arc;

use crate::ai::mock::MockExtractor;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::fetchers::mock::MockFetcher;
use crate::pipeline::Pipeline;
use crate::queue::memory::MemoryQueue;
use crate::queue::worker::{Worker, WorkerConfig};
use crate::search::memory::MemoryIndex;
use crate::stores::memory::MemoryStore;

/// A fully wired in-memory pipeline.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryQueue>,
    pub fetcher: Arc<MockFetcher>,
    pub extractor: Arc<MockExtractor>,
    pub index: Arc<MemoryIndex>,
    pub pipeline: Arc<Pipeline>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let fetcher = Arc::new(MockFetcher::new());
        let extractor = Arc::new(MockExtractor::new());
        let index = Arc::new(MemoryIndex::new());

        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            fetcher.clone(),
            extractor.clone(),
            index.clone(),
            queue.clone(),
            config,
        ));

        Self {
            store,
            queue,
            fetcher,
            extractor,
            index,
            pipeline,
        }
    }

    /// Process every due task. Scheduled retries stay scheduled; call
    /// [`MemoryQueue::make_all_due`] first to collapse their delays.
    pub async fn drain(&self) -> Result<usize> {
        let worker = Worker::with_config(
            self.queue.clone(),
            self.pipeline.clone(),
            WorkerConfig::with_worker_id("test-worker"),
        );
        worker.run_until_empty().await
    }

    /// Drain repeatedly, forcing scheduled retries due each round, until
    /// the queue settles. Returns the total number of tasks processed.
    pub async fn drain_with_retries(&self) -> Result<usize> {
        let mut processed = 0;
        loop {
            self.queue.make_all_due();
            let round = self.drain().await?;
            if round == 0 {
                return Ok(processed);
            }
            processed += round;
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
