//! Required-evaluation determination.
//!
//! Deterministic keyword-and-structure rules decide which evaluation
//! dimensions apply to a question. A rule miss may fall back to an LLM
//! classification; the fallback is optional and memoized by question
//! digest.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::classify::{decompose_aspects, mentions_recency, requested_item_count};
use crate::contracts::llm::{generate_structured, LlmClient, LlmRequest};
use crate::trace::TraceLog;

use super::types::EvaluationType;

/// Rule-based required types for a question.
///
/// Definitive always applies; Strict applies only to the original
/// question. The result is ordered for pipeline execution.
pub fn determine_required_evaluations(question: &str, is_original: bool) -> Vec<EvaluationType> {
    let mut required = vec![EvaluationType::Definitive];
    if mentions_recency(question) {
        required.push(EvaluationType::Freshness);
    }
    if requested_item_count(question).is_some() {
        required.push(EvaluationType::Plurality);
    }
    if decompose_aspects(question).len() >= 2 {
        required.push(EvaluationType::Completeness);
    }
    if is_original {
        required.push(EvaluationType::Strict);
    }
    required
}

#[derive(Debug, Deserialize)]
struct RequiredTypesJudgment {
    #[serde(default)]
    freshness: bool,
    #[serde(default)]
    plurality: bool,
    #[serde(default)]
    completeness: bool,
}

/// Resolver combining the rules with an optional, cached LLM fallback.
pub struct RequiredEvaluationResolver {
    fallback_llm: Option<Arc<dyn LlmClient>>,
    cache: Mutex<HashMap<[u8; 32], Vec<EvaluationType>>>,
    trace: Option<TraceLog>,
}

impl RequiredEvaluationResolver {
    /// Rules only; no LLM fallback.
    pub fn new() -> Self {
        Self {
            fallback_llm: None,
            cache: Mutex::new(HashMap::new()),
            trace: None,
        }
    }

    /// Enable the LLM fallback for questions the rules cannot type.
    pub fn with_fallback(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.fallback_llm = Some(llm);
        self
    }

    pub fn with_trace(mut self, trace: TraceLog) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Required types for a question, ordered for pipeline execution.
    pub async fn resolve(&self, question: &str, is_original: bool) -> Vec<EvaluationType> {
        let rules = determine_required_evaluations(question, is_original);

        // The rules found content-specific dimensions; no fallback needed.
        let content_specific = rules
            .iter()
            .any(|t| !matches!(t, EvaluationType::Definitive | EvaluationType::Strict));
        if content_specific {
            return rules;
        }
        let Some(llm) = &self.fallback_llm else {
            return rules;
        };

        let key: [u8; 32] = Sha256::digest(question.as_bytes()).into();
        if let Some(cached) = self.cache.lock().expect("resolver cache poisoned").get(&key) {
            if let Some(trace) = &self.trace {
                trace.record_cache_lookup(true);
            }
            return merge(cached.clone(), is_original);
        }
        if let Some(trace) = &self.trace {
            trace.record_cache_lookup(false);
        }

        let request = LlmRequest::new(format!(
            "Which evaluation dimensions apply to this question?\n\
             Question: {question}\n\
             Respond as JSON: {{\"freshness\": bool, \"plurality\": bool, \"completeness\": bool}}"
        ))
        .with_temperature(0.0);

        let llm_types = match generate_structured::<RequiredTypesJudgment>(llm.as_ref(), request)
            .await
        {
            Ok((judgment, _usage)) => {
                let mut types = Vec::new();
                if judgment.freshness {
                    types.push(EvaluationType::Freshness);
                }
                if judgment.plurality {
                    types.push(EvaluationType::Plurality);
                }
                if judgment.completeness {
                    types.push(EvaluationType::Completeness);
                }
                types
            }
            Err(e) => {
                debug!(error = %e, "required-evaluation fallback failed, keeping rule result");
                Vec::new()
            }
        };

        self.cache
            .lock()
            .expect("resolver cache poisoned")
            .insert(key, llm_types.clone());
        merge(llm_types, is_original)
    }
}

impl Default for RequiredEvaluationResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn merge(content_types: Vec<EvaluationType>, is_original: bool) -> Vec<EvaluationType> {
    let mut required = vec![EvaluationType::Definitive];
    required.extend(content_types);
    if is_original {
        required.push(EvaluationType::Strict);
    }
    required.sort();
    required.dedup();
    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::pipeline::tests::ScriptedLlm;

    #[test]
    fn test_rules_always_include_definitive() {
        let types = determine_required_evaluations("Why is the sky blue?", false);
        assert_eq!(types, vec![EvaluationType::Definitive]);
    }

    #[test]
    fn test_rules_strict_only_for_original() {
        let original = determine_required_evaluations("Why is the sky blue?", true);
        assert!(original.contains(&EvaluationType::Strict));
        let gap = determine_required_evaluations("Why is the sky blue?", false);
        assert!(!gap.contains(&EvaluationType::Strict));
    }

    #[test]
    fn test_rules_detect_recency_and_plurality() {
        let types =
            determine_required_evaluations("List 5 of the latest open-source databases", true);
        assert!(types.contains(&EvaluationType::Freshness));
        assert!(types.contains(&EvaluationType::Plurality));
        // Ordered for pipeline execution.
        let mut sorted = types.clone();
        sorted.sort();
        assert_eq!(types, sorted);
    }

    #[test]
    fn test_rules_detect_multiple_aspects() {
        let types = determine_required_evaluations(
            "How does raft handle elections and how does it compact logs?",
            false,
        );
        assert!(types.contains(&EvaluationType::Completeness));
    }

    #[tokio::test]
    async fn test_resolver_without_fallback_matches_rules() {
        let resolver = RequiredEvaluationResolver::new();
        let resolved = resolver.resolve("Why is the sky blue?", true).await;
        assert_eq!(resolved, determine_required_evaluations("Why is the sky blue?", true));
    }

    #[tokio::test]
    async fn test_fallback_is_cached() {
        let llm = Arc::new(ScriptedLlm::valued(
            serde_json::json!({"freshness": true, "plurality": false, "completeness": false}),
        ));
        let trace = TraceLog::new();
        let resolver = RequiredEvaluationResolver::new()
            .with_fallback(llm.clone())
            .with_trace(trace.clone());

        let first = resolver.resolve("Something the rules miss", false).await;
        assert!(first.contains(&EvaluationType::Freshness));
        assert_eq!(llm.calls(), 1);

        let second = resolver.resolve("Something the rules miss", false).await;
        assert_eq!(first, second);
        // Served from cache; no second LLM call.
        assert_eq!(llm.calls(), 1);
        assert_eq!(trace.evaluation_evidence().cache_hit_rate, Some(0.5));
    }
}
