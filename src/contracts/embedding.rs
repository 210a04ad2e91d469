//! Embedding contract.

use async_trait::async_trait;

use crate::budget::UsageRecord;
use crate::error::Result;

/// An order-preserving batch of embeddings with its usage report.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// One vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    pub usage: UsageRecord,
}

/// Embedding-provider contract.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Declared vector dimension (typically 768 or 1536).
    fn dimension(&self) -> usize;

    /// Embed texts, preserving input order.
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch>;
}
