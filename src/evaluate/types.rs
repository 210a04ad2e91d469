//! Evaluation types and the evaluator contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::budget::BudgetTracker;
use crate::contracts::llm::LlmClient;
use crate::error::Result;
use crate::persona::types::{Clock, SystemClock};

/// The closed set of evaluation dimensions, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    Definitive,
    Freshness,
    Plurality,
    Completeness,
    Strict,
}

impl EvaluationType {
    /// All evaluation types in pipeline execution order.
    pub const ALL: [EvaluationType; 5] = [
        Self::Definitive,
        Self::Freshness,
        Self::Plurality,
        Self::Completeness,
        Self::Strict,
    ];
}

impl std::fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Definitive => "definitive",
            Self::Freshness => "freshness",
            Self::Plurality => "plurality",
            Self::Completeness => "completeness",
            Self::Strict => "strict",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one evaluator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub eval_type: EvaluationType,
    pub passed: bool,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    pub suggestions: Vec<String>,
    pub duration: Duration,
}

impl EvaluationResult {
    pub fn pass(eval_type: EvaluationType, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            eval_type,
            passed: true,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            suggestions: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn fail(eval_type: EvaluationType, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            eval_type,
            passed: false,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            suggestions: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Shared dependencies handed to each evaluator.
#[derive(Clone)]
pub struct EvalContext {
    pub llm: Arc<dyn LlmClient>,
    pub clock: Arc<dyn Clock>,
    pub tracker: Option<BudgetTracker>,
}

impl EvalContext {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            clock: Arc::new(SystemClock),
            tracker: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tracker(mut self, tracker: BudgetTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Record evaluator LLM usage against the session budget.
    pub fn record_usage(&self, usage: &crate::budget::UsageRecord) {
        if let Some(tracker) = &self.tracker {
            tracker.record(usage.clone());
        }
    }
}

impl std::fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext").finish_non_exhaustive()
    }
}

/// Judgment shape produced by evaluator LLM calls.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmJudgment {
    pub passed: bool,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Run an LLM judgment for an evaluator, recording its usage.
pub(crate) async fn llm_judgment(
    ctx: &EvalContext,
    system: String,
    user: String,
    temperature: f64,
) -> Result<LlmJudgment> {
    let request = crate::contracts::llm::LlmRequest::new(user)
        .with_system(system)
        .with_temperature(temperature);
    let (judgment, usage): (LlmJudgment, _) =
        crate::contracts::llm::generate_structured(ctx.llm.as_ref(), request).await?;
    ctx.record_usage(&usage);
    Ok(judgment)
}

/// One evaluation dimension.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn eval_type(&self) -> EvaluationType;

    /// (system, user) prompt pair for the LLM judgment, when one is used.
    fn prompt(&self, question: &str, answer: &str) -> (String, String);

    async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        ctx: &EvalContext,
    ) -> Result<EvaluationResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order() {
        let mut sorted = EvaluationType::ALL;
        sorted.sort();
        assert_eq!(sorted, EvaluationType::ALL);
        assert!(EvaluationType::Definitive < EvaluationType::Strict);
    }

    #[test]
    fn test_result_constructors_clamp_confidence() {
        let r = EvaluationResult::pass(EvaluationType::Definitive, 1.5, "ok");
        assert_eq!(r.confidence, 1.0);
        let f = EvaluationResult::fail(EvaluationType::Strict, -0.5, "no");
        assert_eq!(f.confidence, 0.0);
        assert!(!f.passed);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(EvaluationType::Completeness.to_string(), "completeness");
    }
}
