//! Discovery: scan the listing page for postings newer than the crawl
//! cursor, create pending records, and enqueue download tasks.

use tracing::{info, warn};

use crate::error::Result;
use crate::pipeline::content::parse_listing;
use crate::pipeline::Pipeline;
use crate::traits::queue::Task;
use crate::types::record::{IngestionRecord, RecordStatus};

/// What one discovery run saw and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Postings parsed from the listing page
    pub seen: usize,
    /// New records created (and download tasks enqueued)
    pub created: usize,
}

impl Pipeline {
    /// Run one discovery pass.
    ///
    /// The listing renders newest first, so everything above the cursor's
    /// post number is new. Records are created oldest first to keep
    /// processing order close to posting order. The cursor only moves
    /// when the page showed something new; fetch and parse failures are
    /// stamped on the cursor row and returned to the caller.
    pub async fn run_discovery(&self) -> Result<DiscoveryReport> {
        let source = &self.config().source;
        let cursor = self.store().get_cursor(source).await?;
        let cursor_post = cursor.and_then(|c| c.last_post_number);

        let listing_url = self.config().listing_url.clone();
        let html = match self.fetcher().fetch(&listing_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(source = %source, error = %e, "listing fetch failed");
                self.store().record_crawl_error(source, &e.to_string()).await?;
                return Err(e.into());
            }
        };

        let postings = match parse_listing(&html, &listing_url) {
            Ok(postings) => postings,
            Err(e) => {
                warn!(source = %source, error = %e, "listing parse failed");
                self.store().record_crawl_error(source, &e.to_string()).await?;
                return Err(e);
            }
        };
        let seen = postings.len();

        let new_entries: Vec<_> = postings
            .into_iter()
            .take_while(|p| Some(&p.post_number) != cursor_post.as_ref())
            .collect();

        if new_entries.is_empty() {
            info!(source = %source, seen, "discovery found nothing new");
            return Ok(DiscoveryReport { seen, created: 0 });
        }

        let newest_post_number = new_entries[0].post_number.clone();

        let mut created = 0;
        for posting in new_entries.iter().rev() {
            let record = IngestionRecord::new(&posting.post_number, &posting.url)
                .with_post_name(&posting.title);
            if self.store().create_record_if_absent(&record).await? {
                self.queue()
                    .enqueue(Task::Download {
                        record_id: record.id,
                    })
                    .await?;
                created += 1;
            } else if let Some(existing) = self
                .store()
                .find_record_by_post_number(&posting.post_number)
                .await?
            {
                // A pending record above the cursor lost its task to an
                // earlier failed pass; give it another one. Download's
                // entry CAS absorbs any resulting double delivery.
                if existing.status == RecordStatus::Pending {
                    self.queue()
                        .enqueue(Task::Download {
                            record_id: existing.id,
                        })
                        .await?;
                }
            }
        }

        self.store()
            .advance_cursor(source, &newest_post_number, created as i64)
            .await?;

        info!(
            source = %source,
            seen,
            created,
            cursor = %newest_post_number,
            "discovery pass complete"
        );
        Ok(DiscoveryReport { seen, created })
    }
}
