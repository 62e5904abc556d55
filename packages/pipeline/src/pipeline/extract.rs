//! Stage 2: LLM extraction of structured advertisement data.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::prompts::{extraction_user_prompt, EXTRACTION_SYSTEM_PROMPT};
use crate::pipeline::sync::sync_advertisement;
use crate::pipeline::Pipeline;
use crate::traits::queue::Task;
use crate::types::extraction::parse_extraction_response;
use crate::types::record::IngestionRecord;

/// What one extraction execution did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Advertisement created and the record marked processed
    Completed,
    /// Failure recorded, retry scheduled with backoff
    Retrying,
    /// Attempts exhausted, record is terminal
    Failed,
    /// Precondition failed: no content yet, or already linked
    Ignored,
}

impl Pipeline {
    /// Run the extraction stage for one record.
    ///
    /// Entry is guarded by a compare-and-set that also refuses records
    /// already linked to an advertisement, so redeliveries after a
    /// successful run are no-ops. Advertisement creation itself is
    /// atomic in the store, which closes the race between two workers
    /// holding the same record. Index sync runs after the domain commit
    /// and its failures are logged, never propagated.
    pub async fn run_extract(&self, record_id: uuid::Uuid) -> Result<ExtractOutcome> {
        let Some(record) = self.store().begin_extraction(record_id).await? else {
            return Ok(ExtractOutcome::Ignored);
        };

        let Some(content) = record.content.clone() else {
            // Unreachable through normal flow; downloaded records have content
            self.store()
                .record_stage_error(record.id, "no content to extract from", true)
                .await?;
            return Ok(ExtractOutcome::Failed);
        };

        let truncated: String = content
            .chars()
            .take(self.config().content_truncate_chars)
            .collect();
        let user_prompt = extraction_user_prompt(&record, &truncated);

        let response = match self
            .extractor()
            .extract_json(EXTRACTION_SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(response) => response,
            Err(e) => return self.fail_extract(&record, e).await,
        };

        let extracted = match parse_extraction_response(&response) {
            Ok(extracted) => extracted,
            Err(e) => return self.fail_extract(&record, e).await,
        };

        let organization_name = extracted.organization_name_or_default(&record);
        let organization = self
            .store()
            .get_or_create_organization(&organization_name, None)
            .await?;

        let (new_ad, languages) = match extracted.into_advertisement(
            &record,
            organization.id,
            self.config().default_deadline_days,
        ) {
            Ok(parts) => parts,
            Err(e) => return self.fail_extract(&record, e).await,
        };

        let ad = self
            .store()
            .create_advertisement(record.id, new_ad, languages)
            .await?;

        if let Err(e) = sync_advertisement(self.store(), self.index(), &ad).await {
            warn!(
                advertisement_id = %ad.id,
                record_id = %record.id,
                error = %e,
                "index sync failed; document will appear on the next rebuild"
            );
        }

        info!(
            record_id = %record.id,
            post_number = %record.post_number,
            advertisement_id = %ad.id,
            organization = %organization.name,
            "extraction complete"
        );
        Ok(ExtractOutcome::Completed)
    }

    /// Record an extraction failure: terminal once the attempt budget is
    /// spent, otherwise re-enqueued with exponential backoff.
    async fn fail_extract(
        &self,
        record: &IngestionRecord,
        error: PipelineError,
    ) -> Result<ExtractOutcome> {
        let terminal = record.attempts >= self.config().extract_max_attempts;
        self.store()
            .record_stage_error(record.id, &error.to_string(), terminal)
            .await?;

        if terminal {
            warn!(
                record_id = %record.id,
                post_number = %record.post_number,
                attempts = record.attempts,
                error = %error,
                "extraction attempts exhausted"
            );
            return Ok(ExtractOutcome::Failed);
        }

        // base * 2^(attempt - 1): 120s, 240s, ...
        let exponent = record.attempts.saturating_sub(1).max(0) as u32;
        let delay_secs = self
            .config()
            .extract_backoff_base
            .as_secs()
            .saturating_mul(2u64.saturating_pow(exponent));
        self.queue()
            .enqueue_at(
                Task::Extract {
                    record_id: record.id,
                },
                Utc::now() + Duration::seconds(delay_secs as i64),
            )
            .await?;

        warn!(
            record_id = %record.id,
            post_number = %record.post_number,
            attempt = record.attempts,
            delay_secs,
            error = %error,
            "extraction failed, retry scheduled"
        );
        Ok(ExtractOutcome::Retrying)
    }
}
