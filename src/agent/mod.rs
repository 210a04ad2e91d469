//! The agent state machine and its supporting types.
//!
//! One step: rotate the current question, compute permissions, ask the
//! LLM for exactly one action, execute it, merge results, re-check the
//! budget. Beast mode forces an answer when the budget nears exhaustion.

pub mod actions;
pub mod context;
pub mod machine;
pub mod permissions;
pub mod prompt;
pub mod state;

pub use actions::{ActionKind, ActionPermissions, AgentAction};
pub use context::{AgentContext, DiaryEntry, Question, QuestionOrigin};
pub use machine::{ResearchAgent, SessionOutcome};
pub use permissions::{
    compute_permissions, MAX_COLLECTED_URLS, MAX_REFLECT_PER_STEP, MAX_URLS_PER_STEP,
};
pub use state::AgentState;
