//! Elasticsearch-compatible search index over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::traits::searcher::SearchIndex;
use crate::types::document::SearchDocument;

/// Search index backed by an Elasticsearch-compatible API.
pub struct ElasticIndex {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticIndex {
    /// Create an index client. `base_url` is the cluster root
    /// (e.g. `http://localhost:9200`).
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index: index.into(),
        }
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index)
    }

    /// Index mapping: english-analyzed text with keyword sub-fields,
    /// completion suggesters on the fields search-as-you-type uses, and
    /// nested language requirements.
    fn mapping() -> serde_json::Value {
        let suggest_text = || {
            json!({
                "type": "text",
                "analyzer": "english",
                "fields": {
                    "keyword": { "type": "keyword" },
                    "suggest": { "type": "completion" }
                }
            })
        };

        json!({
            "settings": {
                "number_of_shards": 1,
                "number_of_replicas": 0
            },
            "mappings": {
                "properties": {
                    "post_number": { "type": "keyword" },
                    "post_name": suggest_text(),
                    "organization": {
                        "properties": {
                            "id": { "type": "keyword" },
                            "name": suggest_text(),
                            "abbreviation": { "type": "keyword" }
                        }
                    },
                    "date_posted": { "type": "date" },
                    "application_deadline": { "type": "date" },
                    "contract_type": { "type": "keyword" },
                    "contract_duration": { "type": "text" },
                    "renewable": { "type": "boolean" },
                    "location_region": suggest_text(),
                    "location_country": suggest_text(),
                    "location_city": suggest_text(),
                    "work_arrangement": { "type": "keyword" },
                    "thematic_area": {
                        "type": "text",
                        "fields": { "keyword": { "type": "keyword" } }
                    },
                    "position_level": { "type": "keyword" },
                    "brief_description": { "type": "text", "analyzer": "english" },
                    "main_skills_competencies": { "type": "text", "analyzer": "english" },
                    "technical_skills": { "type": "text", "analyzer": "english" },
                    "minimum_academic_qualifications": { "type": "text" },
                    "minimum_experience": { "type": "text" },
                    "language_requirements": {
                        "type": "nested",
                        "properties": {
                            "language": { "type": "keyword" },
                            "requirement_level": { "type": "keyword" },
                            "proficiency_level": { "type": "keyword" }
                        }
                    },
                    "tags": { "type": "keyword" },
                    "source_url": { "type": "keyword" },
                    "created_at": { "type": "date" },
                    "is_active": { "type": "boolean" },
                    "days_until_deadline": { "type": "integer" }
                }
            }
        })
    }
}

fn search_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Search(e.to_string().into())
}

#[async_trait]
impl SearchIndex for ElasticIndex {
    async fn ensure_index(&self) -> Result<()> {
        let head = self
            .client
            .head(self.index_url())
            .send()
            .await
            .map_err(search_err)?;

        if head.status().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .put(self.index_url())
            .json(&Self::mapping())
            .send()
            .await
            .map_err(search_err)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(search_err(format!("index creation failed: {}", body)));
        }

        info!(index = %self.index, "search index created");
        Ok(())
    }

    async fn upsert(&self, doc: &SearchDocument) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/_doc/{}", self.index_url(), doc.id))
            .json(doc)
            .send()
            .await
            .map_err(search_err)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(search_err(format!("document upsert failed: {}", body)));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/_doc/{}", self.index_url(), id))
            .send()
            .await
            .map_err(search_err)?;

        // Missing documents are fine
        if !response.status().is_success() && response.status().as_u16() != 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(search_err(format!("document delete failed: {}", body)));
        }

        Ok(())
    }
}
