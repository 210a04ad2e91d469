//! Cognitive-persona query expansion.
//!
//! A persona is a query-expansion strategy with a fixed focus and weight.
//! The orchestrator applies every registered persona to an input query in
//! parallel on a work-stealing pool and collapses duplicate expansions
//! deterministically.

pub mod builtin;
pub mod expand;
pub mod registry;
pub mod types;

pub use builtin::{
    builtin_personas, ComparativeThinker, DetailAnalyst, ExpertSkeptic, Globalizer,
    HistoricalResearcher, RealitySkepticalist, TemporalContext,
};
pub use expand::{ExpansionOutcome, PersonaOrchestrator};
pub use registry::PersonaRegistry;
pub use types::{
    Clock, ExpandContext, FixedClock, IdentityTranslator, Persona, PersonaExecutionMetrics,
    SystemClock, Translator, WeightedQuery, MAX_PERSONA_WEIGHT,
};
