//! Stage 1: download a posting page and normalize its content.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::content::parse_posting;
use crate::pipeline::Pipeline;
use crate::traits::queue::Task;
use crate::types::record::IngestionRecord;

/// What one download execution did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Content stored, extraction enqueued
    Completed,
    /// Duplicate of an already-published advertisement
    Skipped,
    /// Failure recorded, retry scheduled
    Retrying,
    /// Attempts exhausted, record is terminal
    Failed,
    /// Precondition failed: the record is already past this stage
    Ignored,
}

impl Pipeline {
    /// Run the download stage for one record.
    ///
    /// Entry is guarded by a compare-and-set, so redelivered tasks for
    /// records that already moved on are no-ops. An advertisement
    /// already published under the same post number makes the record a
    /// duplicate, which is terminal.
    pub async fn run_download(&self, record_id: uuid::Uuid) -> Result<DownloadOutcome> {
        let Some(record) = self.store().begin_download(record_id).await? else {
            return Ok(DownloadOutcome::Ignored);
        };

        if self
            .store()
            .find_advertisement_by_post_number(&record.post_number)
            .await?
            .is_some()
        {
            info!(record_id = %record.id, post_number = %record.post_number, "duplicate posting, skipping");
            self.store().mark_skipped(record.id).await?;
            return Ok(DownloadOutcome::Skipped);
        }

        let details = match self.fetcher().fetch(&record.source_url).await {
            Ok(html) => match parse_posting(&html, &record.source_url) {
                Ok(details) => details,
                Err(e) => return self.fail_download(&record, e).await,
            },
            Err(e) => return self.fail_download(&record, e.into()).await,
        };

        self.store().complete_download(record.id, &details).await?;
        self.queue()
            .enqueue(Task::Extract {
                record_id: record.id,
            })
            .await?;

        info!(
            record_id = %record.id,
            post_number = %record.post_number,
            content_chars = details.content_markdown.chars().count(),
            "download complete"
        );
        Ok(DownloadOutcome::Completed)
    }

    /// Record a download failure: terminal once the attempt budget is
    /// spent, otherwise re-enqueued after the fixed retry delay.
    async fn fail_download(
        &self,
        record: &IngestionRecord,
        error: PipelineError,
    ) -> Result<DownloadOutcome> {
        let terminal = record.attempts >= self.config().download_max_attempts;
        self.store()
            .record_stage_error(record.id, &error.to_string(), terminal)
            .await?;

        if terminal {
            warn!(
                record_id = %record.id,
                post_number = %record.post_number,
                attempts = record.attempts,
                error = %error,
                "download attempts exhausted"
            );
            return Ok(DownloadOutcome::Failed);
        }

        let delay = Duration::seconds(self.config().download_retry_delay.as_secs() as i64);
        self.queue()
            .enqueue_at(
                Task::Download {
                    record_id: record.id,
                },
                Utc::now() + delay,
            )
            .await?;

        warn!(
            record_id = %record.id,
            post_number = %record.post_number,
            attempt = record.attempts,
            error = %error,
            "download failed, retry scheduled"
        );
        Ok(DownloadOutcome::Retrying)
    }
}
