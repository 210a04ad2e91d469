//! Agent run states and terminal results.

use serde::{Deserialize, Serialize};

use crate::knowledge::types::{KnowledgeItem, Reference};

/// State of one agent run.
///
/// Transitions: Processing→Processing, Processing→BeastMode (budget),
/// BeastMode→BeastMode (failed attempt under the cap), BeastMode→
/// Completed, BeastMode→Failed, Processing→Completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentState {
    Processing {
        step: u32,
        total_step: u32,
        current_question: String,
        budget_used: f64,
    },
    BeastMode {
        attempts: u32,
        last_failure: Option<String>,
    },
    Completed {
        answer: String,
        references: Vec<Reference>,
        /// True for direct answers that skipped research entirely.
        trivial: bool,
    },
    Failed {
        reason: String,
        partial_knowledge: Vec<KnowledgeItem>,
    },
}

impl AgentState {
    pub fn initial(question: &str) -> Self {
        Self::Processing {
            step: 0,
            total_step: 0,
            current_question: question.to_string(),
            budget_used: 0.0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Short name for events and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Processing { .. } => "processing",
            Self::BeastMode { .. } => "beast_mode",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = AgentState::initial("q");
        match state {
            AgentState::Processing { step, total_step, .. } => {
                assert_eq!(step, 0);
                assert_eq!(total_step, 0);
            }
            other => panic!("expected processing, got {other:?}"),
        }
    }

    #[test]
    fn test_terminal_classification() {
        assert!(AgentState::Completed {
            answer: "a".into(),
            references: vec![],
            trivial: false
        }
        .is_terminal());
        assert!(AgentState::Failed {
            reason: "r".into(),
            partial_knowledge: vec![]
        }
        .is_terminal());
        assert!(!AgentState::initial("q").is_terminal());
        assert!(!AgentState::BeastMode {
            attempts: 0,
            last_failure: None
        }
        .is_terminal());
    }
}
