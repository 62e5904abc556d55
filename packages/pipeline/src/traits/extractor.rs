//! LLM extraction seam.

use async_trait::async_trait;

use crate::error::Result;

/// A client that turns a prompt pair into a JSON string.
///
/// The pipeline owns prompt construction and response parsing; the client
/// owns transport, model selection, and response-format negotiation.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn extract_json(&self, system: &str, user: &str) -> Result<String>;
}
