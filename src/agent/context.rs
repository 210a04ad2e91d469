//! The per-run agent context.
//!
//! Exclusively owned by the agent loop. Parallel sub-tasks get immutable
//! snapshots or clone-shared handles to the three serialised tables
//! (budget tracker, URL store, knowledge list); everything else is
//! merged back by the loop at step boundaries.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::budget::BudgetTracker;
use crate::contracts::search::SerpQuery;
use crate::knowledge::store::{KnowledgeBase, UrlStore};

/// Where a question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
    Original,
    GapReflection,
    BeastModeRewrite,
}

/// A question in the rotation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub origin: QuestionOrigin,
}

impl Question {
    pub fn original(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: QuestionOrigin::Original,
        }
    }

    pub fn gap(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: QuestionOrigin::GapReflection,
        }
    }

    /// The forced-answer restatement of the original question that beast
    /// mode works against.
    pub fn beast_rewrite(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: QuestionOrigin::BeastModeRewrite,
        }
    }

    pub fn is_original(&self) -> bool {
        self.origin == QuestionOrigin::Original
    }

    fn normalized(&self) -> String {
        self.text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// One diary line: what a step did, in prompt-ready text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub step: u32,
    pub action: String,
    pub outcome: String,
}

/// Aggregate state owned by one agent run.
#[derive(Debug)]
pub struct AgentContext {
    /// Immutable for the session lifetime.
    pub original_question: Question,
    queue: VecDeque<Question>,
    pub current_question: Question,
    pub knowledge: KnowledgeBase,
    pub urls: UrlStore,
    diary: Vec<DiaryEntry>,
    pub tracker: BudgetTracker,
    /// Meaningful steps completed; resets on the beast-mode transition.
    pub step: u32,
    /// Every attempted step, error steps included.
    pub total_step: u32,
    /// Gap questions accepted during the current step.
    pub gap_questions_this_step: usize,
    executed_queries: Vec<SerpQuery>,
    seen_questions: Vec<String>,
}

impl AgentContext {
    pub fn new(question: impl Into<String>, tracker: BudgetTracker) -> Self {
        let original = Question::original(question);
        let mut queue = VecDeque::new();
        queue.push_back(original.clone());
        Self {
            current_question: original.clone(),
            seen_questions: vec![original.normalized()],
            original_question: original,
            queue,
            knowledge: KnowledgeBase::new(),
            urls: UrlStore::new(),
            diary: Vec::new(),
            tracker,
            step: 0,
            total_step: 0,
            gap_questions_this_step: 0,
            executed_queries: Vec::new(),
        }
    }

    pub fn with_stores(mut self, urls: UrlStore, knowledge: KnowledgeBase) -> Self {
        self.urls = urls;
        self.knowledge = knowledge;
        self
    }

    /// Rotate the next question out of the FIFO queue.
    ///
    /// The original question is re-enqueued so it stays reachable; gap
    /// questions rotate through once.
    pub fn rotate_question(&mut self) -> Question {
        if let Some(next) = self.queue.pop_front() {
            if next.is_original() {
                self.queue.push_back(next.clone());
            }
            self.current_question = next;
        }
        self.current_question.clone()
    }

    /// Enqueue a gap question unless an equivalent one was already seen.
    /// Returns true if accepted.
    pub fn enqueue_gap_question(&mut self, text: &str) -> bool {
        let question = Question::gap(text);
        let key = question.normalized();
        if key.is_empty() || self.seen_questions.contains(&key) {
            return false;
        }
        self.seen_questions.push(key);
        self.queue.push_back(question);
        self.gap_questions_this_step += 1;
        true
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Record a query as executed for future dedup.
    pub fn record_executed_queries(&mut self, queries: impl IntoIterator<Item = SerpQuery>) {
        self.executed_queries.extend(queries);
    }

    pub fn executed_queries(&self) -> &[SerpQuery] {
        &self.executed_queries
    }

    /// Append a diary entry. Called after the action's side-effects on
    /// the stores are visible.
    pub fn add_diary(&mut self, action: impl Into<String>, outcome: impl Into<String>) {
        self.diary.push(DiaryEntry {
            step: self.total_step,
            action: action.into(),
            outcome: outcome.into(),
        });
    }

    pub fn diary(&self) -> &[DiaryEntry] {
        &self.diary
    }

    /// Prompt-ready rendering of the diary, oldest first.
    pub fn format_diary(&self) -> String {
        self.diary
            .iter()
            .map(|e| format!("step {}: [{}] {}", e.step, e.action, e.outcome))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fraction of the token budget consumed.
    pub fn budget_used(&self) -> f64 {
        self.tracker.fraction_used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AgentContext {
        AgentContext::new("original q", BudgetTracker::new(1_000))
    }

    #[test]
    fn test_original_question_always_reachable() {
        let mut ctx = ctx();
        for _ in 0..5 {
            let q = ctx.rotate_question();
            assert!(q.is_original());
        }
        assert_eq!(ctx.queue_len(), 1);
    }

    #[test]
    fn test_gap_questions_rotate_once() {
        let mut ctx = ctx();
        assert!(ctx.enqueue_gap_question("what about latency?"));

        // Queue: [original, gap]; first rotation re-enqueues the original.
        assert!(ctx.rotate_question().is_original());
        let gap = ctx.rotate_question();
        assert_eq!(gap.origin, QuestionOrigin::GapReflection);
        // Gap question is not re-enqueued.
        assert!(ctx.rotate_question().is_original());
        assert_eq!(ctx.queue_len(), 1);
    }

    #[test]
    fn test_beast_rewrite_origin() {
        let q = Question::beast_rewrite("original q");
        assert_eq!(q.origin, QuestionOrigin::BeastModeRewrite);
        assert!(!q.is_original());
    }

    #[test]
    fn test_gap_question_dedup() {
        let mut ctx = ctx();
        assert!(ctx.enqueue_gap_question("What about latency?"));
        assert!(!ctx.enqueue_gap_question("what  about LATENCY?"));
        // The original question itself is rejected as a gap.
        assert!(!ctx.enqueue_gap_question("ORIGINAL q"));
        assert_eq!(ctx.gap_questions_this_step, 1);
    }

    #[test]
    fn test_diary_order_preserved() {
        let mut ctx = ctx();
        ctx.total_step = 1;
        ctx.add_diary("search", "ran 3 queries");
        ctx.total_step = 2;
        ctx.add_diary("read", "read 2 urls");
        let rendered = ctx.format_diary();
        let search_pos = rendered.find("search").unwrap();
        let read_pos = rendered.find("read").unwrap();
        assert!(search_pos < read_pos);
    }
}
