// UN Jobs Ingestion Pipeline
//
// Discovers job postings on unjobs.org, downloads and normalizes them,
// extracts structured advertisement data with an LLM, and keeps a search
// index in sync with the domain store.
//
// Processing runs as a two-stage state machine over a durable task queue;
// storage, fetching, extraction, and indexing sit behind traits so the
// whole pipeline also runs in memory for tests.

pub mod ai;
pub mod config;
pub mod error;
pub mod fetchers;
pub mod pipeline;
pub mod queue;
pub mod search;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

pub use config::{Config, PipelineConfig};
pub use error::{FetchError, FetchResult, PipelineError, Result};
pub use pipeline::{DiscoveryReport, DownloadOutcome, ExtractOutcome, Pipeline};
