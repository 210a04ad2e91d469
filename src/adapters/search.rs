//! Retrying wrapper over any search contract.

use async_trait::async_trait;
use std::sync::Arc;

use crate::contracts::search::{SearchClient, SearchResult, SerpQuery};
use crate::error::Result;

use super::retry::{retry_with_backoff, RetryConfig};

/// Wraps a [`SearchClient`] with bounded retry and per-call timeouts.
pub struct RetryingSearch {
    inner: Arc<dyn SearchClient>,
    config: RetryConfig,
}

impl RetryingSearch {
    pub fn new(inner: Arc<dyn SearchClient>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl SearchClient for RetryingSearch {
    async fn search(&self, query: &SerpQuery) -> Result<SearchResult> {
        retry_with_backoff(&self.config, "search", || self.inner.search(query)).await
    }

    async fn rerank(&self, query: &SerpQuery, candidates: Vec<String>) -> Result<Vec<String>> {
        retry_with_backoff(&self.config, "rerank", || {
            self.inner.rerank(query, candidates.clone())
        })
        .await
    }
}
