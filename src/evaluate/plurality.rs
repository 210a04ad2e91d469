//! Plurality evaluator: answers must present as many items as requested.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Instant;

use crate::classify::requested_item_count;
use crate::error::Result;

use super::types::{EvalContext, EvaluationResult, EvaluationType, Evaluator};

static LIST_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d{1,3}[.)])\s+(.+)$").unwrap());

/// Count distinct items presented by an answer.
///
/// Bulleted or numbered lines count when present; otherwise the answer
/// is split on list separators within its longest sentence.
pub fn count_items(answer: &str) -> usize {
    let mut items: Vec<String> = answer
        .lines()
        .filter_map(|line| LIST_LINE_RE.captures(line))
        .map(|caps| caps[1].trim().to_lowercase())
        .collect();

    if items.is_empty() {
        let longest = answer
            .split_inclusive(['.', '!', '?'])
            .max_by_key(|s| s.len())
            .unwrap_or(answer);
        items = longest
            .split([',', ';'])
            .flat_map(|seg| seg.split(" and "))
            .map(|seg| seg.trim().trim_end_matches(['.', '!', '?']).to_lowercase())
            .filter(|seg| !seg.is_empty())
            .collect();
    }

    let distinct: HashSet<&String> = items.iter().collect();
    distinct.len()
}

/// Checks that an answer delivers the number of items the question asks
/// for. Not applicable when the question requests no specific count.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluralityEvaluator;

#[async_trait]
impl Evaluator for PluralityEvaluator {
    fn eval_type(&self) -> EvaluationType {
        EvaluationType::Plurality
    }

    fn prompt(&self, question: &str, answer: &str) -> (String, String) {
        let system = "You judge whether an answer presents as many distinct \
items as the question requests. Respond as JSON: {\"passed\": bool, \
\"confidence\": 0.0-1.0, \"reasoning\": string, \"suggestions\": [string]}."
            .to_string();
        let user = format!("Question: {question}\n\nAnswer: {answer}\n\nDoes the count match?");
        (system, user)
    }

    async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        _ctx: &EvalContext,
    ) -> Result<EvaluationResult> {
        let started = Instant::now();

        let Some(requested) = requested_item_count(question) else {
            return Ok(EvaluationResult::pass(
                self.eval_type(),
                1.0,
                "question requests no specific item count",
            )
            .with_duration(started.elapsed()));
        };

        let found = count_items(answer);
        let mut result = if found >= requested {
            EvaluationResult::pass(
                self.eval_type(),
                0.9,
                format!("answer presents {found} items, {requested} requested"),
            )
        } else {
            EvaluationResult::fail(
                self.eval_type(),
                0.9,
                format!("answer presents {found} items but the question requests {requested}"),
            )
            .with_suggestions(vec![format!(
                "Add {} more distinct item{}",
                requested - found,
                if requested - found == 1 { "" } else { "s" }
            )])
        };
        result.duration = started.elapsed();
        Ok(result)
    }
}
