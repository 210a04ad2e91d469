//! Definitive evaluator: rejects empty, hedged, or non-committal answers.

use async_trait::async_trait;
use std::time::Instant;

use crate::classify::has_hedging;
use crate::error::Result;

use super::types::{llm_judgment, EvalContext, EvaluationResult, EvaluationType, Evaluator};

/// Confidence below which a hedged answer fails outright.
const HEDGED_CONFIDENCE_FLOOR: f64 = 0.7;

/// Always-applicable check that the answer actually commits to something.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitiveEvaluator;

#[async_trait]
impl Evaluator for DefinitiveEvaluator {
    fn eval_type(&self) -> EvaluationType {
        EvaluationType::Definitive
    }

    fn prompt(&self, question: &str, answer: &str) -> (String, String) {
        let system = "You judge whether an answer is definitive. An answer is \
definitive when it commits to a concrete claim instead of deflecting, hedging, \
or restating the question. Respond as JSON: {\"passed\": bool, \"confidence\": \
0.0-1.0, \"reasoning\": string, \"suggestions\": [string]}."
            .to_string();
        let user = format!("Question: {question}\n\nAnswer: {answer}\n\nIs this answer definitive?");
        (system, user)
    }

    async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        ctx: &EvalContext,
    ) -> Result<EvaluationResult> {
        let started = Instant::now();

        if answer.trim().is_empty() {
            return Ok(EvaluationResult::fail(
                self.eval_type(),
                0.0,
                "answer is empty",
            )
            .with_suggestions(vec!["Provide an actual answer to the question".into()])
            .with_duration(started.elapsed()));
        }

        let hedged = has_hedging(answer);
        let (system, user) = self.prompt(question, answer);
        let judgment = llm_judgment(ctx, system, user, 0.0).await?;

        let passed = judgment.passed && !(hedged && judgment.confidence < HEDGED_CONFIDENCE_FLOOR);
        let mut result = if passed {
            EvaluationResult::pass(self.eval_type(), judgment.confidence, judgment.reasoning)
        } else {
            let reasoning = if hedged && judgment.confidence < HEDGED_CONFIDENCE_FLOOR {
                format!(
                    "answer hedges and confidence {:.2} is below {HEDGED_CONFIDENCE_FLOOR}: {}",
                    judgment.confidence, judgment.reasoning
                )
            } else {
                judgment.reasoning
            };
            EvaluationResult::fail(self.eval_type(), judgment.confidence, reasoning)
                .with_suggestions(judgment.suggestions)
        };
        result.duration = started.elapsed();
        Ok(result)
    }
}
