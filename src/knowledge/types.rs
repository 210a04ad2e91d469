//! URL records, knowledge items, and references.

use serde::{Deserialize, Serialize};

use crate::evaluate::types::EvaluationType;

/// Inputs to the deterministic URL score.
///
/// Score = query weight × frequency × hostname boost × path boost ×
/// optional rerank factor. Boosts are multiplicative and > 1 for
/// authoritative hosts and documentation-like paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub query_weight: f64,
    pub hostname_boost: f64,
    pub path_boost: f64,
    pub rerank: Option<f64>,
}

impl Default for ScoreInputs {
    fn default() -> Self {
        Self {
            query_weight: 1.0,
            hostname_boost: 1.0,
            path_boost: 1.0,
            rerank: None,
        }
    }
}

impl ScoreInputs {
    /// Score for a given observation frequency.
    pub fn score(&self, frequency: u64) -> f64 {
        self.query_weight
            * frequency as f64
            * self.hostname_boost
            * self.path_boost
            * self.rerank.unwrap_or(1.0)
    }
}

/// A discovered URL with its score and visit state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Canonical absolute URL; unique key within the store.
    pub url: String,
    pub hostname: String,
    /// Title from the search snippet that surfaced this URL, if any.
    pub title: Option<String>,
    pub score: f64,
    /// One-way flag; flips false→true on a successful read.
    pub visited: bool,
    /// Step at which the URL was first discovered.
    pub discovered_at: u32,
}

/// One unit of accumulated knowledge.
///
/// Insertion order is preserved and is part of the prompt's temporal
/// context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KnowledgeItem {
    /// A question answered with supporting references.
    Qa {
        question: String,
        answer: String,
        references: Vec<Reference>,
    },
    /// Incidental information tied to a source URL.
    SideInfo {
        question: String,
        answer: String,
        source_url: String,
    },
    /// A rejected answer attempt; the sole mechanism by which the agent
    /// learns from evaluator rejection.
    Error {
        question: String,
        attempted_answer: String,
        failed_eval: EvaluationType,
        reason: String,
        suggestions: Vec<String>,
    },
}

impl KnowledgeItem {
    /// The question this item is about.
    pub fn question(&self) -> &str {
        match self {
            Self::Qa { question, .. }
            | Self::SideInfo { question, .. }
            | Self::Error { question, .. } => question,
        }
    }

    /// Source URL, for items that carry one.
    pub fn source_url(&self) -> Option<&str> {
        match self {
            Self::SideInfo { source_url, .. } => Some(source_url),
            _ => None,
        }
    }
}

/// A citation extracted from an answer.
///
/// Validity is a lookup, not an ownership relation: the `source_url` is
/// the canonical URL string and must name a visited record in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub excerpt: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}
