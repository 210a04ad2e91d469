//! # dra-core
//!
//! The reasoning engine of a deep-research agent: given a question and a
//! token budget, it drives an iterative loop of web search, page reading,
//! reflection, and answer generation, stopping when an answer passes a
//! multi-dimensional quality gate or the budget runs out.
//!
//! ## Core Components
//!
//! - **Agent**: the state machine, action permissions, and per-run context
//! - **Persona**: parallel query expansion across cognitive perspectives
//! - **Evaluate**: the fail-fast answer evaluation pipeline
//! - **Knowledge**: the URL store and insertion-ordered knowledge list
//! - **Contracts**: traits for the LLM, search, reader, embedding, and
//!   sandbox collaborators
//!
//! ## Example
//!
//! ```rust,ignore
//! use dra_core::{ResearchAgent, SessionConfig};
//!
//! let agent = ResearchAgent::new(SessionConfig::default(), llm, search, reader, embedder);
//! let outcome = agent.run("List 5 open-source BSD-licensed databases.").await?;
//! println!("{}", outcome.record.render_text_log());
//! ```

pub mod adapters;
pub mod agent;
pub mod budget;
pub mod classify;
pub mod config;
pub mod contracts;
pub mod dedup;
pub mod error;
pub mod evaluate;
pub mod events;
pub mod knowledge;
pub mod logging;
pub mod persona;
pub mod session;
pub mod similarity;
pub mod trace;

// Re-exports for convenience
pub use adapters::{retry_with_backoff, HttpReader, RetryConfig, RetryingReader, RetryingSearch};
pub use agent::{
    compute_permissions, ActionKind, ActionPermissions, AgentAction, AgentContext, AgentState,
    DiaryEntry, Question, QuestionOrigin, ResearchAgent, SessionOutcome, MAX_COLLECTED_URLS,
    MAX_REFLECT_PER_STEP, MAX_URLS_PER_STEP,
};
pub use budget::{BudgetSnapshot, BudgetTracker, ToolUsage, UsageRecord};
pub use classify::{
    classify_topic, decompose_aspects, has_hedging, mentions_recency, requested_item_count,
    TopicCategory,
};
pub use config::{EnvSettings, SessionConfig, DEFAULT_TOKEN_BUDGET};
pub use contracts::{
    generate_structured, EmbeddingBatch, EmbeddingClient, LlmClient, LlmDecision, LlmReply,
    LlmRequest, ReadContentType, ReadResult, ReaderClient, Sandbox, SandboxResult, SearchClient,
    SearchResult, SerpQuery, Snippet,
};
pub use dedup::{DedupOutcome, QueryDedupGate};
pub use error::{Error, Result};
pub use evaluate::{
    EvalContext, EvaluationResult, EvaluationType, Evaluator, EvaluatorPipeline, PipelineOutcome,
    RequiredEvaluationResolver,
};
pub use events::{AgentEvent, EventBus, PersonaActivity, StampedEvent};
pub use knowledge::{canonicalize, KnowledgeBase, KnowledgeItem, Reference, ScoreInputs, UrlRecord, UrlStore};
pub use persona::{
    builtin_personas, Clock, ExpandContext, ExpansionOutcome, FixedClock, IdentityTranslator,
    Persona, PersonaExecutionMetrics, PersonaOrchestrator, PersonaRegistry, SystemClock,
    Translator, WeightedQuery,
};
pub use session::{
    BatchRecord, LogLine, PersonaStats, SessionRecord, SessionStats, SessionTiming, TaskRecord,
};
pub use similarity::{cosine, dedup_against, max_similarity, DEFAULT_DEDUP_THRESHOLD};
pub use trace::{
    answer_hash, percentiles, EvaluationEvidenceReport, EvaluationTrace, LatencyPercentiles,
    SearchEvidenceReport, SearchTrace, TraceLog,
};
