//! Completeness evaluator: multi-aspect questions need multi-aspect answers.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Instant;

use crate::classify::decompose_aspects;
use crate::error::Result;

use super::types::{EvalContext, EvaluationResult, EvaluationType, Evaluator};

/// Fraction of aspects an answer must address.
const COVERAGE_THRESHOLD: f64 = 0.8;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "when", "where", "which", "does", "did",
    "how", "why", "who", "its", "their", "about", "with", "that", "this", "these", "those",
    "should", "would", "could", "have", "has", "had",
];

fn content_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Checks aspect coverage for questions that decompose into several
/// aspects. An aspect counts as addressed when the answer mentions any
/// of its content words.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessEvaluator;

#[async_trait]
impl Evaluator for CompletenessEvaluator {
    fn eval_type(&self) -> EvaluationType {
        EvaluationType::Completeness
    }

    fn prompt(&self, question: &str, answer: &str) -> (String, String) {
        let system = "You judge whether an answer addresses every aspect of a \
multi-part question. Respond as JSON: {\"passed\": bool, \"confidence\": \
0.0-1.0, \"reasoning\": string, \"suggestions\": [string]}."
            .to_string();
        let user =
            format!("Question: {question}\n\nAnswer: {answer}\n\nAre all aspects addressed?");
        (system, user)
    }

    async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        _ctx: &EvalContext,
    ) -> Result<EvaluationResult> {
        let started = Instant::now();

        let aspects = decompose_aspects(question);
        if aspects.len() < 2 {
            return Ok(EvaluationResult::pass(
                self.eval_type(),
                1.0,
                "question has a single aspect",
            )
            .with_duration(started.elapsed()));
        }

        let answer_words: HashSet<String> = content_words(answer).into_iter().collect();
        let mut uncovered: Vec<&String> = Vec::new();
        for aspect in &aspects {
            let covered = content_words(aspect)
                .iter()
                .any(|w| answer_words.contains(w));
            if !covered {
                uncovered.push(aspect);
            }
        }

        let total = aspects.len();
        let covered = total - uncovered.len();
        let ratio = covered as f64 / total as f64;

        let mut result = if ratio >= COVERAGE_THRESHOLD {
            EvaluationResult::pass(
                self.eval_type(),
                0.85,
                format!("{covered}/{total} aspects addressed"),
            )
        } else {
            EvaluationResult::fail(
                self.eval_type(),
                0.85,
                format!("only {covered}/{total} aspects addressed"),
            )
            .with_suggestions(
                uncovered
                    .iter()
                    .map(|a| format!("Address the aspect: {a}"))
                    .collect(),
            )
        };
        result.duration = started.elapsed();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::pipeline::tests::ScriptedLlm;
    use std::sync::Arc;

    fn ctx() -> EvalContext {
        EvalContext::new(Arc::new(ScriptedLlm::failing()))
    }

    #[tokio::test]
    async fn test_single_aspect_passes() {
        let result = CompletenessEvaluator
            .evaluate("What is ownership?", "A compile-time memory discipline.", &ctx())
            .await
            .unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_covering_both_aspects_passes() {
        let result = CompletenessEvaluator
            .evaluate(
                "How does Rust handle memory safety and what does borrowing cost at runtime?",
                "Memory safety comes from ownership checks at compile time; borrowing costs nothing at runtime.",
                &ctx(),
            )
            .await
            .unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_missing_aspect_fails_with_suggestion() {
        let result = CompletenessEvaluator
            .evaluate(
                "Explain garbage collection pauses and explain compacting collectors?",
                "Pauses happen when the collector stops the world.",
                &ctx(),
            )
            .await
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.suggestions.len(), 1);
        assert!(result.suggestions[0].contains("compacting"));
    }
}
