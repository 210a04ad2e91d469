//! Multi-dimensional answer evaluation.
//!
//! Five evaluators run in a fixed order with fail-fast semantics:
//! definitive, freshness, plurality, completeness, strict. A failure
//! becomes an Error knowledge item; that is the only way the agent
//! learns from rejection.

pub mod completeness;
pub mod definitive;
pub mod freshness;
pub mod pipeline;
pub mod plurality;
pub mod required;
pub mod strict;
pub mod types;

pub use pipeline::{EvaluatorPipeline, PipelineOutcome};
pub use required::RequiredEvaluationResolver;
pub use types::{EvalContext, EvaluationResult, EvaluationType, Evaluator};
