//! Scripted extraction client for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{PipelineError, Result};
use crate::traits::extractor::ExtractionClient;

/// Extraction client that replays scripted responses.
#[derive(Default)]
pub struct MockExtractor {
    responses: RwLock<VecDeque<String>>,
    failures: AtomicU32,
    calls: AtomicU32,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response; each call to the extractor consumes one.
    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.write().unwrap().push_back(response.into());
    }

    /// Make the next `count` calls fail before consuming a response.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of extraction calls made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionClient for MockExtractor {
    async fn extract_json(&self, _system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::Ai("scripted extraction failure".into()));
        }

        self.responses
            .write()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PipelineError::Ai("no scripted response left".into()))
    }
}
