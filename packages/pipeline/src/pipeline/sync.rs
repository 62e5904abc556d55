//! Search index synchronization.
//!
//! The index is downstream of the domain store: documents are projected
//! from committed rows and pushed after the fact. Index failures are
//! surfaced to the caller but never undo domain writes; a full rebuild
//! re-derives every document.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::traits::searcher::SearchIndex;
use crate::traits::store::PipelineStore;
use crate::types::document::SearchDocument;
use crate::types::job::JobAdvertisement;

/// Project one advertisement and upsert its document.
pub async fn sync_advertisement(
    store: &dyn PipelineStore,
    index: &dyn SearchIndex,
    ad: &JobAdvertisement,
) -> Result<()> {
    let organization = store
        .get_organization(ad.organization_id)
        .await?
        .ok_or_else(|| {
            PipelineError::Storage(
                format!("organization {} missing for advertisement {}", ad.organization_id, ad.id)
                    .into(),
            )
        })?;
    let languages = store.get_language_requirements(ad.id).await?;

    let doc = SearchDocument::project(ad, &organization, &languages, Utc::now().date_naive());
    index.upsert(&doc).await
}

/// Rebuild the whole index from the domain store. Per-document failures
/// are logged and skipped so one bad row cannot block the rest. Returns
/// the number of documents synced.
pub async fn rebuild_index(store: &dyn PipelineStore, index: &dyn SearchIndex) -> Result<usize> {
    index.ensure_index().await?;

    let advertisements = store.list_advertisements().await?;
    let total = advertisements.len();
    let mut synced = 0;

    for ad in &advertisements {
        match sync_advertisement(store, index, ad).await {
            Ok(()) => synced += 1,
            Err(e) => {
                warn!(advertisement_id = %ad.id, error = %e, "skipping document during rebuild");
            }
        }
    }

    info!(synced, total, "index rebuild finished");
    Ok(synced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::memory::MemoryIndex;
    use crate::stores::memory::MemoryStore;
    use crate::traits::store::DomainStore;
    use crate::traits::store::RecordStore;
    use crate::types::extraction::ExtractedJob;
    use crate::types::record::IngestionRecord;

    async fn seed_advertisement(store: &MemoryStore) -> JobAdvertisement {
        let record = IngestionRecord::new("77001", "https://unjobs.org/vacancies/77001")
            .with_post_name("Programme Analyst");
        store.create_record_if_absent(&record).await.unwrap();

        let org = store
            .get_or_create_organization("UNICEF", None)
            .await
            .unwrap();
        let extracted = ExtractedJob {
            post_name: Some("Programme Analyst".to_string()),
            application_deadline: Some("2099-01-01".to_string()),
            ..Default::default()
        };
        let (ad, langs) = extracted.into_advertisement(&record, org.id, 30).unwrap();
        store.create_advertisement(record.id, ad, langs).await.unwrap()
    }

    #[tokio::test]
    async fn test_sync_projects_one_document() {
        let store = MemoryStore::new();
        let index = MemoryIndex::new();
        let ad = seed_advertisement(&store).await;

        sync_advertisement(&store, &index, &ad).await.unwrap();

        let doc = index.get(ad.id).unwrap();
        assert_eq!(doc.post_number, "77001");
        assert_eq!(doc.organization.name, "UNICEF");
        assert!(doc.is_active);
    }

    #[tokio::test]
    async fn test_rebuild_covers_all_advertisements() {
        let store = MemoryStore::new();
        let index = MemoryIndex::new();
        let ad = seed_advertisement(&store).await;

        let synced = rebuild_index(&store, &index).await.unwrap();
        assert_eq!(synced, 1);
        assert!(index.get(ad.id).is_some());
    }
}
