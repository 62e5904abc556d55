//! Search index seam.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::document::SearchDocument;

/// Write side of the search index. The index is a rebuildable cache:
/// callers must tolerate failures without affecting domain state.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Create the index with its mapping if it does not exist.
    async fn ensure_index(&self) -> Result<()>;

    /// Insert or replace a document, keyed by the advertisement id.
    async fn upsert(&self, doc: &SearchDocument) -> Result<()>;

    /// Remove a document. Missing documents are not an error.
    async fn delete(&self, id: Uuid) -> Result<()>;
}
