//! In-memory search index for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::traits::searcher::SearchIndex;
use crate::types::document::SearchDocument;

/// In-memory index with failure injection, for verifying that index
/// errors never disturb domain state.
#[derive(Default)]
pub struct MemoryIndex {
    docs: RwLock<HashMap<Uuid, SearchDocument>>,
    fail_writes: AtomicBool,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent upserts fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, id: Uuid) -> Option<SearchDocument> {
        self.docs.read().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().unwrap().is_empty()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn ensure_index(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, doc: &SearchDocument) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PipelineError::Search("injected index failure".into()));
        }
        self.docs.write().unwrap().insert(doc.id, doc.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.docs.write().unwrap().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document::{LanguageRequirementDoc, OrganizationDoc};
    use chrono::Utc;

    fn doc(id: Uuid) -> SearchDocument {
        SearchDocument {
            id,
            post_number: "77001".to_string(),
            post_name: "Programme Analyst".to_string(),
            organization: OrganizationDoc {
                id: Uuid::new_v4(),
                name: "UNICEF".to_string(),
                abbreviation: None,
            },
            date_posted: "2025-01-01".parse().unwrap(),
            application_deadline: "2025-01-31".parse().unwrap(),
            contract_type: "fixed_term".to_string(),
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
            language_requirements: Vec::<LanguageRequirementDoc>::new(),
            tags: vec![],
            source_url: None,
            created_at: Utc::now(),
            is_active: true,
            days_until_deadline: 10,
        }
    }

    #[tokio::test]
    async fn test_upsert_delete_round_trip() {
        let index = MemoryIndex::new();
        let id = Uuid::new_v4();
        index.upsert(&doc(id)).await.unwrap();
        assert_eq!(index.len(), 1);

        index.delete(id).await.unwrap();
        assert!(index.is_empty());

        // Deleting a missing document is not an error
        index.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let index = MemoryIndex::new();
        index.fail_writes(true);
        let result = index.upsert(&doc(Uuid::new_v4())).await;
        assert!(matches!(result, Err(PipelineError::Search(_))));
        assert!(index.is_empty());
    }
}
