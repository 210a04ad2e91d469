//! Search contract and query types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// A single search-engine query.
///
/// Equality is structural. `tbs` follows the upstream provider's
/// recency-filter grammar (e.g. `qdr:m`); the core never parses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerpQuery {
    pub q: String,
    /// Optional recency filter in provider grammar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tbs: Option<String>,
    /// Optional region hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl SerpQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            tbs: None,
            location: None,
        }
    }

    pub fn with_tbs(mut self, tbs: impl Into<String>) -> Self {
        self.tbs = Some(tbs.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Normalized query string used for duplicate collapsing.
    pub fn normalized(&self) -> String {
        self.q.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }
}

/// One result snippet from a search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub title: String,
    pub url: String,
    pub excerpt: String,
}

/// Result of one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub snippets: Vec<Snippet>,
    pub raw_latency: Duration,
}

/// Web-search contract.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Execute a query.
    async fn search(&self, query: &SerpQuery) -> Result<SearchResult>;

    /// Rerank candidate URLs for a query. Identity by default.
    async fn rerank(&self, query: &SerpQuery, candidates: Vec<String>) -> Result<Vec<String>> {
        let _ = query;
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = SerpQuery::new("rust async").with_tbs("qdr:m");
        let b = SerpQuery::new("rust async").with_tbs("qdr:m");
        let c = SerpQuery::new("rust async");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_normalized_collapses_whitespace_and_case() {
        let q = SerpQuery::new("  Rust   ASYNC runtimes ");
        assert_eq!(q.normalized(), "rust async runtimes");
    }
}
