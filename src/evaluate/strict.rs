//! Strict evaluator: bias-to-reject review of depth and specificity.
//!
//! Applies only to answers targeting the original question, never to
//! gap-reflection questions; the required-types resolver enforces that.

use async_trait::async_trait;
use std::time::Instant;

use crate::error::Result;

use super::types::{llm_judgment, EvalContext, EvaluationResult, EvaluationType, Evaluator};

#[derive(Debug, Clone, Copy, Default)]
pub struct StrictEvaluator;

#[async_trait]
impl Evaluator for StrictEvaluator {
    fn eval_type(&self) -> EvaluationType {
        EvaluationType::Strict
    }

    fn prompt(&self, question: &str, answer: &str) -> (String, String) {
        let system = "You are a demanding reviewer. Reject answers that lack \
depth, specificity, or insight. A merely adequate answer fails; only answers a \
domain expert would endorse pass. When in doubt, reject and say what is \
missing. Respond as JSON: {\"passed\": bool, \"confidence\": 0.0-1.0, \
\"reasoning\": string, \"suggestions\": [string]}."
            .to_string();
        let user = format!(
            "Question: {question}\n\nAnswer: {answer}\n\nDoes this answer meet an expert bar?"
        );
        (system, user)
    }

    async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        ctx: &EvalContext,
    ) -> Result<EvaluationResult> {
        let started = Instant::now();
        let (system, user) = self.prompt(question, answer);
        let judgment = llm_judgment(ctx, system, user, 0.0).await?;

        let mut result = if judgment.passed {
            EvaluationResult::pass(self.eval_type(), judgment.confidence, judgment.reasoning)
        } else {
            EvaluationResult::fail(self.eval_type(), judgment.confidence, judgment.reasoning)
                .with_suggestions(judgment.suggestions)
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

    #[tokio::test]
    async fn test_rejection_carries_suggestions() {
        let llm = ScriptedLlm::judging_with_suggestions(
            false,
            0.8,
            "surface-level",
            vec!["Cover the failure modes".into()],
        );
        let ctx = EvalContext::new(Arc::new(llm));
        let result = StrictEvaluator
            .evaluate("How do quorum systems degrade?", "They degrade.", &ctx)
            .await
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.suggestions, vec!["Cover the failure modes".to_string()]);
    }

    #[tokio::test]
    async fn test_expert_answer_passes() {
        let ctx = EvalContext::new(Arc::new(ScriptedLlm::judging(true, 0.9, "thorough")));
        let result = StrictEvaluator
            .evaluate("q", "a detailed expert treatment", &ctx)
            .await
            .unwrap();
        assert!(result.passed);
    }
}
