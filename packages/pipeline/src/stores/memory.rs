//! In-memory storage implementation for testing and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::traits::store::{DomainStore, RecordStore};
use crate::types::job::{
    JobAdvertisement, LanguageRequirement, NewJobAdvertisement, NewLanguageRequirement,
    Organization,
};
use crate::types::record::{
    CrawlCursor, IngestionRecord, PageDetails, RecordStatus, RecordStatusView,
};

#[derive(Default)]
struct Inner {
    records: HashMap<Uuid, IngestionRecord>,
    record_by_post_number: HashMap<String, Uuid>,
    organizations: HashMap<Uuid, Organization>,
    org_by_name: HashMap<String, Uuid>,
    advertisements: HashMap<Uuid, JobAdvertisement>,
    ad_by_post_number: HashMap<String, Uuid>,
    ad_by_record: HashMap<Uuid, Uuid>,
    languages: HashMap<Uuid, Vec<LanguageRequirement>>,
    cursors: HashMap<String, CrawlCursor>,
}

/// In-memory store for records, organizations, and advertisements.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart. Compare-and-set transitions run under
/// one lock, so concurrent stage executions serialize the same way
/// they do against the Postgres store.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of stored ingestion records.
    pub fn record_count(&self) -> usize {
        self.inner.read().unwrap().records.len()
    }

    /// Number of stored organizations.
    pub fn organization_count(&self) -> usize {
        self.inner.read().unwrap().organizations.len()
    }

    /// Number of stored advertisements.
    pub fn advertisement_count(&self) -> usize {
        self.inner.read().unwrap().advertisements.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_record_if_absent(&self, record: &IngestionRecord) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        if inner.record_by_post_number.contains_key(&record.post_number) {
            return Ok(false);
        }
        inner
            .record_by_post_number
            .insert(record.post_number.clone(), record.id);
        inner.records.insert(record.id, record.clone());
        Ok(true)
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<IngestionRecord>> {
        Ok(self.inner.read().unwrap().records.get(&id).cloned())
    }

    async fn find_record_by_post_number(
        &self,
        post_number: &str,
    ) -> Result<Option<IngestionRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .record_by_post_number
            .get(post_number)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn begin_download(&self, id: Uuid) -> Result<Option<IngestionRecord>> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(PipelineError::RecordNotFound { id })?;
        if !matches!(
            record.status,
            RecordStatus::Pending | RecordStatus::Downloading
        ) {
            return Ok(None);
        }
        record.status = RecordStatus::Downloading;
        record.attempts += 1;
        record.last_attempt_at = Some(Utc::now());
        Ok(Some(record.clone()))
    }

    async fn complete_download(&self, id: Uuid, details: &PageDetails) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(PipelineError::RecordNotFound { id })?;
        if record.status != RecordStatus::Downloading {
            return Ok(());
        }
        record.status = RecordStatus::Downloaded;
        record.content = Some(details.content_markdown.clone());
        record.post_name = Some(details.title.clone());
        if details.organization_name.is_some() {
            record.organization_name = details.organization_name.clone();
        }
        if details.location_country.is_some() {
            record.location_country = details.location_country.clone();
        }
        if details.location_city.is_some() {
            record.location_city = details.location_city.clone();
        }
        record.attempts = 0;
        record.last_error = None;
        Ok(())
    }

    async fn begin_extraction(&self, id: Uuid) -> Result<Option<IngestionRecord>> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(PipelineError::RecordNotFound { id })?;
        let admissible = matches!(
            record.status,
            RecordStatus::Downloaded | RecordStatus::Processing
        ) && record.job_advertisement_id.is_none();
        if !admissible {
            return Ok(None);
        }
        record.status = RecordStatus::Processing;
        record.attempts += 1;
        record.last_attempt_at = Some(Utc::now());
        Ok(Some(record.clone()))
    }

    async fn record_stage_error(&self, id: Uuid, error: &str, terminal: bool) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(PipelineError::RecordNotFound { id })?;
        record.last_error = Some(error.to_string());
        if terminal {
            record.status = RecordStatus::Failed;
        }
        Ok(())
    }

    async fn mark_skipped(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(PipelineError::RecordNotFound { id })?;
        if !record.status.is_terminal() {
            record.status = RecordStatus::Skipped;
        }
        Ok(())
    }

    async fn get_cursor(&self, source: &str) -> Result<Option<CrawlCursor>> {
        Ok(self.inner.read().unwrap().cursors.get(source).cloned())
    }

    async fn advance_cursor(
        &self,
        source: &str,
        last_post_number: &str,
        newly_discovered: i64,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let cursor = inner
            .cursors
            .entry(source.to_string())
            .or_insert_with(|| CrawlCursor::new(source));
        cursor.last_post_number = Some(last_post_number.to_string());
        cursor.last_crawl_at = Some(Utc::now());
        cursor.last_error = None;
        cursor.total_discovered += newly_discovered;
        Ok(())
    }

    async fn record_crawl_error(&self, source: &str, error: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let cursor = inner
            .cursors
            .entry(source.to_string())
            .or_insert_with(|| CrawlCursor::new(source));
        cursor.last_error = Some(error.to_string());
        Ok(())
    }

    async fn list_statuses(&self) -> Result<Vec<RecordStatusView>> {
        let inner = self.inner.read().unwrap();
        let mut views: Vec<_> = inner
            .records
            .values()
            .map(|r| RecordStatusView {
                post_number: r.post_number.clone(),
                status: r.status,
                attempts: r.attempts,
                last_error: r.last_error.clone(),
                last_attempt_at: r.last_attempt_at,
            })
            .collect();
        views.sort_by(|a, b| a.post_number.cmp(&b.post_number));
        Ok(views)
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn get_or_create_organization(
        &self,
        name: &str,
        abbreviation: Option<&str>,
    ) -> Result<Organization> {
        let mut inner = self.inner.write().unwrap();
        if let Some(id) = inner.org_by_name.get(name) {
            let id = *id;
            if let Some(org) = inner.organizations.get_mut(&id) {
                if org.abbreviation.is_none() {
                    org.abbreviation = abbreviation.map(str::to_string);
                }
                return Ok(org.clone());
            }
        }
        let org = Organization::new(name, abbreviation.map(str::to_string));
        inner.org_by_name.insert(name.to_string(), org.id);
        inner.organizations.insert(org.id, org.clone());
        Ok(org)
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        Ok(self.inner.read().unwrap().organizations.get(&id).cloned())
    }

    async fn get_advertisement(&self, id: Uuid) -> Result<Option<JobAdvertisement>> {
        Ok(self.inner.read().unwrap().advertisements.get(&id).cloned())
    }

    async fn find_advertisement_by_post_number(
        &self,
        post_number: &str,
    ) -> Result<Option<JobAdvertisement>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .ad_by_post_number
            .get(post_number)
            .and_then(|id| inner.advertisements.get(id))
            .cloned())
    }

    async fn list_advertisements(&self) -> Result<Vec<JobAdvertisement>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .advertisements
            .values()
            .cloned()
            .collect())
    }

    async fn create_advertisement(
        &self,
        record_id: Uuid,
        ad: NewJobAdvertisement,
        languages: Vec<NewLanguageRequirement>,
    ) -> Result<JobAdvertisement> {
        let mut inner = self.inner.write().unwrap();

        // A linked record always wins, regardless of who asked
        if let Some(existing_id) = inner.ad_by_record.get(&record_id) {
            let existing = inner
                .advertisements
                .get(existing_id)
                .cloned()
                .ok_or_else(|| {
                    PipelineError::Storage("dangling advertisement link".into())
                })?;
            return Ok(existing);
        }

        if !inner.records.contains_key(&record_id) {
            return Err(PipelineError::RecordNotFound { id: record_id });
        }

        let advertisement = JobAdvertisement {
            id: Uuid::new_v4(),
            organization_id: ad.organization_id,
            post_number: ad.post_number,
            post_name: ad.post_name,
            date_posted: ad.date_posted,
            application_deadline: ad.application_deadline,
            contract_type: ad.contract_type,
            contract_duration: ad.contract_duration,
            renewable: ad.renewable,
            location_region: ad.location_region,
            location_country: ad.location_country,
            location_city: ad.location_city,
            work_arrangement: ad.work_arrangement,
            thematic_area: ad.thematic_area,
            position_level: ad.position_level,
            brief_description: ad.brief_description,
            main_skills_competencies: ad.main_skills_competencies,
            technical_skills: ad.technical_skills,
            minimum_academic_qualifications: ad.minimum_academic_qualifications,
            minimum_experience: ad.minimum_experience,
            tags: ad.tags,
            source_url: ad.source_url,
            ingestion_record_id: record_id,
            created_at: Utc::now(),
        };

        let requirements: Vec<_> = languages
            .into_iter()
            .map(|l| LanguageRequirement {
                id: Uuid::new_v4(),
                job_advertisement_id: advertisement.id,
                language: l.language,
                requirement_level: l.requirement_level,
                proficiency_level: l.proficiency_level,
            })
            .collect();

        inner
            .ad_by_post_number
            .insert(advertisement.post_number.clone(), advertisement.id);
        inner.ad_by_record.insert(record_id, advertisement.id);
        inner.languages.insert(advertisement.id, requirements);
        inner
            .advertisements
            .insert(advertisement.id, advertisement.clone());

        if let Some(record) = inner.records.get_mut(&record_id) {
            record.status = RecordStatus::Processed;
            record.job_advertisement_id = Some(advertisement.id);
            record.last_error = None;
        }

        Ok(advertisement)
    }

    async fn get_language_requirements(
        &self,
        advertisement_id: Uuid,
    ) -> Result<Vec<LanguageRequirement>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .languages
            .get(&advertisement_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::job::ContractType;

    fn new_ad(org_id: Uuid, post_number: &str) -> NewJobAdvertisement {
        NewJobAdvertisement {
            organization_id: org_id,
            post_number: post_number.to_string(),
            post_name: "Analyst".to_string(),
            date_posted: "2025-01-01".parse().unwrap(),
            application_deadline: "2025-01-31".parse().unwrap(),
            contract_type: ContractType::Other,
            contract_duration: None,
            renewable: false,
            location_region: None,
            location_country: "Kenya".to_string(),
            location_city: None,
            work_arrangement: None,
            thematic_area: None,
            position_level: None,
            brief_description: None,
            main_skills_competencies: None,
            technical_skills: None,
            minimum_academic_qualifications: None,
            minimum_experience: None,
            tags: vec![],
            source_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_record_is_idempotent() {
        let store = MemoryStore::new();
        let record = IngestionRecord::new("77001", "https://unjobs.org/vacancies/77001");
        assert!(store.create_record_if_absent(&record).await.unwrap());

        let duplicate = IngestionRecord::new("77001", "https://unjobs.org/vacancies/77001");
        assert!(!store.create_record_if_absent(&duplicate).await.unwrap());
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_begin_download_cas() {
        let store = MemoryStore::new();
        let record = IngestionRecord::new("77001", "https://unjobs.org/vacancies/77001");
        store.create_record_if_absent(&record).await.unwrap();

        let first = store.begin_download(record.id).await.unwrap().unwrap();
        assert_eq!(first.status, RecordStatus::Downloading);
        assert_eq!(first.attempts, 1);

        // A retry re-enters the in-flight stage
        let second = store.begin_download(record.id).await.unwrap().unwrap();
        assert_eq!(second.attempts, 2);

        // Once past the stage, redelivery is a no-op
        let details = PageDetails {
            title: "Analyst".to_string(),
            content_markdown: "# Analyst".to_string(),
            organization_name: None,
            location_country: None,
            location_city: None,
        };
        store.complete_download(record.id, &details).await.unwrap();
        assert!(store.begin_download(record.id).await.unwrap().is_none());

        let stored = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Downloaded);
        assert_eq!(stored.attempts, 0);
    }

    #[tokio::test]
    async fn test_begin_extraction_requires_download() {
        let store = MemoryStore::new();
        let record = IngestionRecord::new("77001", "https://unjobs.org/vacancies/77001");
        store.create_record_if_absent(&record).await.unwrap();

        assert!(store.begin_extraction(record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_linked_record_blocks_reextraction() {
        let store = MemoryStore::new();
        let record = IngestionRecord::new("77001", "https://unjobs.org/vacancies/77001");
        store.create_record_if_absent(&record).await.unwrap();
        store.begin_download(record.id).await.unwrap();
        let details = PageDetails {
            title: "Analyst".to_string(),
            content_markdown: "# Analyst".to_string(),
            organization_name: None,
            location_country: None,
            location_city: None,
        };
        store.complete_download(record.id, &details).await.unwrap();
        store.begin_extraction(record.id).await.unwrap().unwrap();

        let org = store
            .get_or_create_organization("UNICEF", None)
            .await
            .unwrap();
        let ad = store
            .create_advertisement(record.id, new_ad(org.id, "77001"), vec![])
            .await
            .unwrap();

        // Linked: further entries are no-ops, duplicate create returns existing
        assert!(store.begin_extraction(record.id).await.unwrap().is_none());
        let again = store
            .create_advertisement(record.id, new_ad(org.id, "77001"), vec![])
            .await
            .unwrap();
        assert_eq!(again.id, ad.id);
        assert_eq!(store.advertisement_count(), 1);

        let stored = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Processed);
        assert_eq!(stored.job_advertisement_id, Some(ad.id));
    }

    #[tokio::test]
    async fn test_get_or_create_organization_dedupes() {
        let store = MemoryStore::new();
        let first = store
            .get_or_create_organization("UNICEF", None)
            .await
            .unwrap();
        let second = store
            .get_or_create_organization("UNICEF", Some("UNICEF"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.abbreviation.as_deref(), Some("UNICEF"));
        assert_eq!(store.organization_count(), 1);
    }

    #[tokio::test]
    async fn test_cursor_advance_and_error() {
        let store = MemoryStore::new();
        assert!(store.get_cursor("unjobs.org").await.unwrap().is_none());

        store.advance_cursor("unjobs.org", "77005", 5).await.unwrap();
        let cursor = store.get_cursor("unjobs.org").await.unwrap().unwrap();
        assert_eq!(cursor.last_post_number.as_deref(), Some("77005"));
        assert_eq!(cursor.total_discovered, 5);

        store
            .record_crawl_error("unjobs.org", "HTTP 503")
            .await
            .unwrap();
        let cursor = store.get_cursor("unjobs.org").await.unwrap().unwrap();
        assert_eq!(cursor.last_post_number.as_deref(), Some("77005"));
        assert_eq!(cursor.last_error.as_deref(), Some("HTTP 503"));
    }
}
