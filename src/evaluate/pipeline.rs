//! Fail-fast sequential evaluation pipeline.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::knowledge::types::KnowledgeItem;
use crate::trace::{answer_hash, EvaluationTrace, TraceLog};

use super::completeness::CompletenessEvaluator;
use super::definitive::DefinitiveEvaluator;
use super::freshness::FreshnessEvaluator;
use super::plurality::PluralityEvaluator;
use super::strict::StrictEvaluator;
use super::types::{EvalContext, EvaluationResult, EvaluationType, Evaluator};

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Results in execution order, ending at the first failure.
    pub results: Vec<EvaluationResult>,
    pub passed: bool,
}

impl PipelineOutcome {
    /// The failing result, if the pipeline failed.
    pub fn failure(&self) -> Option<&EvaluationResult> {
        self.results.iter().find(|r| !r.passed)
    }

    /// Convert a failure into the Error knowledge item the agent learns
    /// from. None when the pipeline passed.
    pub fn to_error_knowledge(&self, question: &str, answer: &str) -> Option<KnowledgeItem> {
        let failure = self.failure()?;
        Some(KnowledgeItem::Error {
            question: question.to_string(),
            attempted_answer: answer.to_string(),
            failed_eval: failure.eval_type,
            reason: failure.reasoning.clone(),
            suggestions: failure.suggestions.clone(),
        })
    }
}

/// Runs evaluators in the fixed order, skipping those not required and
/// stopping at the first failure.
pub struct EvaluatorPipeline {
    evaluators: Vec<Box<dyn Evaluator>>,
    ctx: EvalContext,
    trace: Option<TraceLog>,
}

impl EvaluatorPipeline {
    /// Pipeline with all five evaluators in execution order.
    pub fn new(ctx: EvalContext) -> Self {
        Self {
            evaluators: vec![
                Box::new(DefinitiveEvaluator),
                Box::new(FreshnessEvaluator),
                Box::new(PluralityEvaluator),
                Box::new(CompletenessEvaluator),
                Box::new(StrictEvaluator),
            ],
            ctx,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: TraceLog) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Evaluate an answer against the required dimensions.
    pub async fn evaluate_sequential(
        &self,
        question: &str,
        answer: &str,
        required_types: &[EvaluationType],
    ) -> Result<PipelineOutcome> {
        let mut results = Vec::new();

        for evaluator in &self.evaluators {
            let eval_type = evaluator.eval_type();
            if !required_types.contains(&eval_type) {
                continue;
            }

            let start = Utc::now();
            let tokens_before = self.tracked_tokens();
            let result = evaluator.evaluate(question, answer, &self.ctx).await?;
            let end = Utc::now();

            if let Some(trace) = &self.trace {
                trace.record_evaluation(EvaluationTrace {
                    trace_id: Uuid::new_v4(),
                    eval_type,
                    question: question.to_string(),
                    answer_hash: answer_hash(answer),
                    start,
                    end,
                    tokens_used: self.tracked_tokens().saturating_sub(tokens_before),
                    passed: result.passed,
                    confidence: result.confidence,
                    reasoning_length: result.reasoning.len(),
                });
            }

            let passed = result.passed;
            debug!(%eval_type, passed, confidence = result.confidence, "evaluator finished");
            results.push(result);

            if !passed {
                info!(%eval_type, "evaluation failed, stopping pipeline");
                return Ok(PipelineOutcome {
                    results,
                    passed: false,
                });
            }
        }

        Ok(PipelineOutcome {
            results,
            passed: true,
        })
    }

    fn tracked_tokens(&self) -> u64 {
        self.ctx
            .tracker
            .as_ref()
            .map(|t| t.total_tokens())
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::actions::ActionPermissions;
    use crate::budget::{BudgetTracker, UsageRecord};
    use crate::contracts::llm::{LlmClient, LlmDecision, LlmReply, LlmRequest};
    use crate::error::Error;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Scripted LLM returning a fixed JSON value for every structured call.
    pub(crate) struct ScriptedLlm {
        value: Option<Value>,
        calls: AtomicU64,
    }

    impl ScriptedLlm {
        /// Errors on any call; use where the LLM must not be consulted.
        pub(crate) fn failing() -> Self {
            Self {
                value: None,
                calls: AtomicU64::new(0),
            }
        }

        pub(crate) fn valued(value: Value) -> Self {
            Self {
                value: Some(value),
                calls: AtomicU64::new(0),
            }
        }

        pub(crate) fn judging(passed: bool, confidence: f64, reasoning: &str) -> Self {
            Self::valued(serde_json::json!({
                "passed": passed,
                "confidence": confidence,
                "reasoning": reasoning,
            }))
        }

        pub(crate) fn judging_with_suggestions(
            passed: bool,
            confidence: f64,
            reasoning: &str,
            suggestions: Vec<String>,
        ) -> Self {
            Self::valued(serde_json::json!({
                "passed": passed,
                "confidence": confidence,
                "reasoning": reasoning,
                "suggestions": suggestions,
            }))
        }

        pub(crate) fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn decide_action(
            &self,
            _request: LlmRequest,
            _allowed: &ActionPermissions,
        ) -> crate::error::Result<LlmDecision> {
            Err(Error::contract("scripted llm does not decide actions"))
        }

        async fn generate_value(&self, _request: LlmRequest) -> crate::error::Result<LlmReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.value {
                Some(value) => Ok(LlmReply {
                    value: value.clone(),
                    usage: UsageRecord::new("llm", 40, 20),
                }),
                None => Err(Error::transient("llm", "scripted failure")),
            }
        }
    }

    fn passing_ctx() -> EvalContext {
        EvalContext::new(Arc::new(ScriptedLlm::judging(true, 0.9, "fine")))
    }

    #[tokio::test]
    async fn test_skips_types_not_required() {
        let pipeline = EvaluatorPipeline::new(passing_ctx());
        let outcome = pipeline
            .evaluate_sequential("What is 2+2?", "4.", &[EvaluationType::Definitive])
            .await
            .unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].eval_type, EvaluationType::Definitive);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        // Plurality fails deterministically (3 items of 5); Strict would
        // need the LLM, so fail-fast must stop before reaching it.
        let llm = Arc::new(ScriptedLlm::judging(true, 0.9, "fine"));
        let pipeline = EvaluatorPipeline::new(EvalContext::new(llm.clone()));

        let outcome = pipeline
            .evaluate_sequential(
                "List 5 open-source BSD-licensed databases.",
                "- PostgreSQL\n- Redis\n- SQLite",
                &[
                    EvaluationType::Definitive,
                    EvaluationType::Plurality,
                    EvaluationType::Strict,
                ],
            )
            .await
            .unwrap();

        assert!(!outcome.passed);
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.eval_type, EvaluationType::Plurality);
        // Definitive ran (one LLM call), Strict never did.
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_converts_to_error_knowledge() {
        let pipeline = EvaluatorPipeline::new(passing_ctx());
        let question = "List 5 open-source BSD-licensed databases.";
        let answer = "- PostgreSQL\n- Redis\n- SQLite";
        let outcome = pipeline
            .evaluate_sequential(question, answer, &[EvaluationType::Plurality])
            .await
            .unwrap();

        let item = outcome.to_error_knowledge(question, answer).unwrap();
        match item {
            KnowledgeItem::Error {
                failed_eval,
                suggestions,
                ..
            } => {
                assert_eq!(failed_eval, EvaluationType::Plurality);
                assert_eq!(suggestions.len(), 1);
            }
            other => panic!("expected error knowledge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_traces_recorded_per_evaluator() {
        let trace = TraceLog::new();
        let tracker = BudgetTracker::new(1_000_000);
        let ctx = passing_ctx().with_tracker(tracker);
        let pipeline = EvaluatorPipeline::new(ctx).with_trace(trace.clone());

        pipeline
            .evaluate_sequential(
                "What is 2+2?",
                "4.",
                &[EvaluationType::Definitive, EvaluationType::Strict],
            )
            .await
            .unwrap();

        assert_eq!(trace.evaluation_count(), 2);
        let report = trace.evaluation_evidence();
        assert_eq!(report.pass_rate, 1.0);
        // Each of the two evaluators made one 60-token LLM call.
        assert!((report.tokens_per_eval - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_pass_through_when_all_pass() {
        let pipeline = EvaluatorPipeline::new(passing_ctx());
        let outcome = pipeline
            .evaluate_sequential(
                "What is 2+2?",
                "The answer is 4.",
                &[EvaluationType::Definitive, EvaluationType::Strict],
            )
            .await
            .unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.to_error_knowledge("q", "a").is_none());
    }
}
