//! Agent actions and the per-step permission set.

use serde::{Deserialize, Serialize};

use crate::contracts::search::SerpQuery;
use crate::knowledge::types::Reference;

/// The action variants an agent step can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Search,
    Read,
    Reflect,
    Answer,
    Coding,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Search => "search",
            Self::Read => "read",
            Self::Reflect => "reflect",
            Self::Answer => "answer",
            Self::Coding => "coding",
        };
        write!(f, "{s}")
    }
}

/// One step's chosen operation with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    Search { queries: Vec<SerpQuery> },
    Read { urls: Vec<String> },
    Reflect { gap_questions: Vec<String> },
    Answer { answer: String, references: Vec<Reference> },
    Coding { code: String },
}

impl AgentAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Search { .. } => ActionKind::Search,
            Self::Read { .. } => ActionKind::Read,
            Self::Reflect { .. } => ActionKind::Reflect,
            Self::Answer { .. } => ActionKind::Answer,
            Self::Coding { .. } => ActionKind::Coding,
        }
    }
}

/// Allowed-action set for one step.
///
/// Derived deterministically from context and recomputed at the top of
/// every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPermissions {
    pub search: bool,
    pub read: bool,
    pub reflect: bool,
    pub answer: bool,
    pub coding: bool,
}

impl ActionPermissions {
    /// The beast-mode set: only answer.
    pub fn answer_only() -> Self {
        Self {
            search: false,
            read: false,
            reflect: false,
            answer: true,
            coding: false,
        }
    }

    pub fn allows(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Search => self.search,
            ActionKind::Read => self.read,
            ActionKind::Reflect => self.reflect,
            ActionKind::Answer => self.answer,
            ActionKind::Coding => self.coding,
        }
    }

    /// Names of the allowed actions, for prompt rendering.
    pub fn allowed_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.search {
            names.push("search");
        }
        if self.read {
            names.push("read");
        }
        if self.reflect {
            names.push("reflect");
        }
        if self.answer {
            names.push("answer");
        }
        if self.coding {
            names.push("coding");
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kinds() {
        let action = AgentAction::Search {
            queries: vec![SerpQuery::new("q")],
        };
        assert_eq!(action.kind(), ActionKind::Search);
        assert_eq!(action.kind().to_string(), "search");
    }

    #[test]
    fn test_answer_only_set() {
        let perms = ActionPermissions::answer_only();
        assert!(perms.allows(ActionKind::Answer));
        assert!(!perms.allows(ActionKind::Search));
        assert!(!perms.allows(ActionKind::Read));
        assert!(!perms.allows(ActionKind::Reflect));
        assert!(!perms.allows(ActionKind::Coding));
        assert_eq!(perms.allowed_names(), vec!["answer"]);
    }

    #[test]
    fn test_action_serde_tagging() {
        let action = AgentAction::Reflect {
            gap_questions: vec!["what about x?".into()],
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "reflect");
        let back: AgentAction = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }
}
