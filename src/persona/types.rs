//! Persona contract and supporting types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::classify::TopicCategory;
use crate::contracts::search::SerpQuery;

/// Upper bound for persona weights.
pub const MAX_PERSONA_WEIGHT: f64 = 2.0;

/// Injectable clock so date-consuming personas stay testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A frozen clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Pluggable translation backend for the Globalizer persona.
///
/// The default is the identity function; a real backend is optional.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, lang: &str) -> String;
}

/// Translator that returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, text: &str, _lang: &str) -> String {
        text.to_string()
    }
}

/// Context handed to each persona expansion.
#[derive(Clone)]
pub struct ExpandContext {
    pub topic: TopicCategory,
    pub clock: Arc<dyn Clock>,
    pub translator: Arc<dyn Translator>,
}

impl ExpandContext {
    /// System clock, identity translator, topic classified from the query.
    pub fn for_topic(topic: TopicCategory) -> Self {
        Self {
            topic,
            clock: Arc::new(SystemClock),
            translator: Arc::new(IdentityTranslator),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }
}

impl std::fmt::Debug for ExpandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpandContext").field("topic", &self.topic).finish()
    }
}

/// A query-expansion strategy with a fixed focus and weight.
///
/// For a given (persona, query, context) the output must be identical
/// across runs; personas that consume the current date take it from the
/// context clock.
pub trait Persona: Send + Sync {
    /// Unique persona name.
    fn name(&self) -> &str;

    /// What this persona looks for. At least ten characters.
    fn focus(&self) -> &str;

    /// Weight in [0, MAX_PERSONA_WEIGHT] applied to produced queries.
    fn weight(&self) -> f64 {
        1.0
    }

    /// Produce one perspective-shifted query.
    fn expand(&self, original: &SerpQuery, ctx: &ExpandContext) -> SerpQuery;
}

/// A persona-produced query with its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedQuery {
    pub query: SerpQuery,
    pub weight: f64,
    pub source_persona: String,
}

/// Timing record for one persona expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaExecutionMetrics {
    pub persona_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub input: String,
    pub output_query: SerpQuery,
}
