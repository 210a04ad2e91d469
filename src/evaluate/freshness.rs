//! Freshness evaluator: rejects stale dated information.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::time::Instant;

use crate::classify::{classify_topic, mentioned_years, TopicCategory};
use crate::error::Result;

use super::types::{EvalContext, EvaluationResult, EvaluationType, Evaluator};

/// Maximum allowed staleness for a topic, or None for unbounded.
fn threshold_for(topic: TopicCategory) -> Option<ChronoDuration> {
    match topic {
        TopicCategory::Finance => Some(ChronoDuration::hours(2)),
        TopicCategory::News => Some(ChronoDuration::days(1)),
        TopicCategory::Technology => Some(ChronoDuration::days(30)),
        TopicCategory::Science => Some(ChronoDuration::days(365)),
        TopicCategory::History => None,
        TopicCategory::General => Some(ChronoDuration::days(7)),
    }
}

/// Deterministic staleness check against topic-derived thresholds.
///
/// The newest date detected in the answer anchors the check; bare years
/// are taken as their last day so a current-year mention never reads as
/// stale.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshnessEvaluator;

#[async_trait]
impl Evaluator for FreshnessEvaluator {
    fn eval_type(&self) -> EvaluationType {
        EvaluationType::Freshness
    }

    fn prompt(&self, question: &str, answer: &str) -> (String, String) {
        let system = "You judge whether an answer's dated information is fresh \
enough for the question. Respond as JSON: {\"passed\": bool, \"confidence\": \
0.0-1.0, \"reasoning\": string, \"suggestions\": [string]}."
            .to_string();
        let user = format!("Question: {question}\n\nAnswer: {answer}\n\nIs the information fresh?");
        (system, user)
    }

    async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        ctx: &EvalContext,
    ) -> Result<EvaluationResult> {
        let started = Instant::now();
        let topic = classify_topic(question);

        let Some(threshold) = threshold_for(topic) else {
            return Ok(EvaluationResult::pass(
                self.eval_type(),
                1.0,
                "historical topic, staleness unbounded",
            )
            .with_duration(started.elapsed()));
        };

        let years = mentioned_years(answer);
        let Some(&newest) = years.last() else {
            return Ok(EvaluationResult::pass(
                self.eval_type(),
                0.8,
                "no dated information detected",
            )
            .with_duration(started.elapsed()));
        };

        let anchor = Utc
            .with_ymd_and_hms(newest, 12, 31, 23, 59, 59)
            .single()
            .unwrap_or_else(Utc::now);
        let now = ctx.clock.now();
        let age = now - anchor.min(now);

        let mut result = if age <= threshold {
            EvaluationResult::pass(
                self.eval_type(),
                0.9,
                format!("newest dated information from {newest} is within the {topic:?} threshold"),
            )
        } else {
            EvaluationResult::fail(
                self.eval_type(),
                0.9,
                format!(
                    "newest dated information from {newest} is {} days old, over the {topic:?} threshold",
                    age.num_days()
                ),
            )
            .with_suggestions(vec![format!(
                "Search for information newer than {newest} before answering"
            )])
        };
        result.duration = started.elapsed();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::pipeline::tests::ScriptedLlm;
    use crate::persona::types::FixedClock;
    use std::sync::Arc;

    fn ctx_at(year: i32) -> EvalContext {
        EvalContext::new(Arc::new(ScriptedLlm::failing())).with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap(),
        )))
    }

    #[tokio::test]
    async fn test_history_unbounded() {
        let result = FreshnessEvaluator
            .evaluate(
                "When was the Roman empire founded?",
                "Traditionally dated to 27 BC; scholarship from 1950 still holds.",
                &ctx_at(2025),
            )
            .await
            .unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_stale_technology_fails() {
        let result = FreshnessEvaluator
            .evaluate(
                "What is the latest stable release of the framework software?",
                "The latest release shipped in 2019.",
                &ctx_at(2025),
            )
            .await
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.suggestions.len(), 1);
    }

    #[tokio::test]
    async fn test_current_year_technology_passes() {
        // Bare years anchor to year end, so a current-year mention is fresh.
        let result = FreshnessEvaluator
            .evaluate(
                "What is the latest stable release of the framework software?",
                "Version 3.2 shipped in 2025.",
                &ctx_at(2025),
            )
            .await
            .unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_undated_answer_passes() {
        let result = FreshnessEvaluator
            .evaluate("What color is the sky?", "Blue, due to Rayleigh scattering.", &ctx_at(2025))
            .await
            .unwrap();
        assert!(result.passed);
    }
}
