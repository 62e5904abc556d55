//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

use crate::error::{PipelineError, Result};

/// Per-stage tuning knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Listing page to scan during discovery
    pub listing_url: String,
    /// Cursor key for the crawled source
    pub source: String,
    /// Download attempts before a record goes terminal
    pub download_max_attempts: i32,
    /// Fixed delay between download retries
    pub download_retry_delay: Duration,
    /// Extraction attempts before a record goes terminal
    pub extract_max_attempts: i32,
    /// Base delay for exponential extraction backoff
    pub extract_backoff_base: Duration,
    /// Character budget for content sent to the LLM
    pub content_truncate_chars: usize,
    /// Deadline window applied when a posting states none
    pub default_deadline_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://unjobs.org".to_string(),
            source: "unjobs.org".to_string(),
            download_max_attempts: 5,
            download_retry_delay: Duration::from_secs(60),
            extract_max_attempts: 3,
            extract_backoff_base: Duration::from_secs(120),
            content_truncate_chars: 8000,
            default_deadline_days: 30,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub search_url: String,
    pub search_index: String,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = PipelineConfig::default();

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            openai_api_key: require("OPENAI_API_KEY")?,
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            search_url: env::var("SEARCH_URL")
                .unwrap_or_else(|_| "http://localhost:9200".to_string()),
            search_index: env::var("SEARCH_INDEX")
                .unwrap_or_else(|_| "job_advertisements".to_string()),
            pipeline: PipelineConfig {
                listing_url: env::var("LISTING_URL").unwrap_or(defaults.listing_url),
                source: env::var("CRAWL_SOURCE").unwrap_or(defaults.source),
                download_max_attempts: parse_or(
                    "DOWNLOAD_MAX_ATTEMPTS",
                    defaults.download_max_attempts,
                )?,
                download_retry_delay: Duration::from_secs(parse_or(
                    "DOWNLOAD_RETRY_DELAY_SECS",
                    defaults.download_retry_delay.as_secs(),
                )?),
                extract_max_attempts: parse_or(
                    "EXTRACT_MAX_ATTEMPTS",
                    defaults.extract_max_attempts,
                )?,
                extract_backoff_base: Duration::from_secs(parse_or(
                    "EXTRACT_BACKOFF_BASE_SECS",
                    defaults.extract_backoff_base.as_secs(),
                )?),
                content_truncate_chars: parse_or(
                    "CONTENT_TRUNCATE_CHARS",
                    defaults.content_truncate_chars,
                )?,
                default_deadline_days: parse_or(
                    "DEFAULT_DEADLINE_DAYS",
                    defaults.default_deadline_days,
                )?,
            },
        })
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name).map_err(|_| PipelineError::Config(format!("{} must be set", name).into()))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| PipelineError::Config(format!("{} must be a valid number", name).into())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.download_max_attempts, 5);
        assert_eq!(config.download_retry_delay, Duration::from_secs(60));
        assert_eq!(config.extract_max_attempts, 3);
        assert_eq!(config.content_truncate_chars, 8000);
        assert_eq!(config.default_deadline_days, 30);
    }
}
