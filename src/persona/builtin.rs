//! The seven built-in personas.
//!
//! Each shifts the query toward one research perspective. Expansions are
//! plain string transforms so they stay deterministic; only
//! TemporalContext consumes the clock.

use chrono::Datelike;

use crate::classify::TopicCategory;
use crate::contracts::search::SerpQuery;

use super::types::{ExpandContext, Persona};

/// Challenges claims and hunts for contradicting evidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpertSkeptic;

impl Persona for ExpertSkeptic {
    fn name(&self) -> &str {
        "expert_skeptic"
    }

    fn focus(&self) -> &str {
        "counter-evidence, known criticisms, and failure modes of the claim"
    }

    fn expand(&self, original: &SerpQuery, _ctx: &ExpandContext) -> SerpQuery {
        SerpQuery::new(format!("{} criticism problems limitations", original.q))
    }
}

/// Digs into specifics and mechanics.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailAnalyst;

impl Persona for DetailAnalyst {
    fn name(&self) -> &str {
        "detail_analyst"
    }

    fn focus(&self) -> &str {
        "precise specifications, internals, and concrete mechanics"
    }

    fn expand(&self, original: &SerpQuery, _ctx: &ExpandContext) -> SerpQuery {
        SerpQuery::new(format!("{} detailed specification how it works", original.q))
    }
}

/// Looks backwards for origin and evolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalResearcher;

impl Persona for HistoricalResearcher {
    fn name(&self) -> &str {
        "historical_researcher"
    }

    fn focus(&self) -> &str {
        "origins, evolution over time, and prior art of the subject"
    }

    fn expand(&self, original: &SerpQuery, _ctx: &ExpandContext) -> SerpQuery {
        SerpQuery::new(format!("{} history evolution timeline", original.q))
    }
}

/// Positions the subject against its alternatives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparativeThinker;

impl Persona for ComparativeThinker {
    fn name(&self) -> &str {
        "comparative_thinker"
    }

    fn focus(&self) -> &str {
        "alternatives, trade-offs, and head-to-head comparisons"
    }

    fn expand(&self, original: &SerpQuery, _ctx: &ExpandContext) -> SerpQuery {
        SerpQuery::new(format!("{} vs alternatives comparison", original.q))
    }
}

/// Anchors the query in the present; attaches a recency filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalContext;

impl TemporalContext {
    fn tbs_for(topic: TopicCategory) -> &'static str {
        match topic {
            TopicCategory::Finance => "qdr:h",
            TopicCategory::News => "qdr:d",
            TopicCategory::Technology => "qdr:m",
            _ => "qdr:y",
        }
    }
}

impl Persona for TemporalContext {
    fn name(&self) -> &str {
        "temporal_context"
    }

    fn focus(&self) -> &str {
        "the current state of the subject as of the present date"
    }

    fn weight(&self) -> f64 {
        1.2
    }

    fn expand(&self, original: &SerpQuery, ctx: &ExpandContext) -> SerpQuery {
        let year = ctx.clock.now().year();
        SerpQuery::new(format!("{} {year}", original.q)).with_tbs(Self::tbs_for(ctx.topic))
    }
}

/// Widens the query beyond the home region; may translate it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Globalizer;

impl Globalizer {
    fn region_and_lang(topic: TopicCategory) -> (&'static str, &'static str) {
        match topic {
            TopicCategory::Finance => ("gb", "en"),
            TopicCategory::News => ("in", "en"),
            TopicCategory::Technology => ("jp", "ja"),
            TopicCategory::Science => ("de", "de"),
            TopicCategory::History => ("it", "it"),
            TopicCategory::General => ("fr", "fr"),
        }
    }
}

impl Persona for Globalizer {
    fn name(&self) -> &str {
        "globalizer"
    }

    fn focus(&self) -> &str {
        "non-anglophone sources and regional perspectives on the subject"
    }

    fn expand(&self, original: &SerpQuery, ctx: &ExpandContext) -> SerpQuery {
        let (region, lang) = Self::region_and_lang(ctx.topic);
        let translated = ctx.translator.translate(&original.q, lang);
        SerpQuery::new(translated).with_location(region)
    }
}

/// Separates established fact from repetition and rumor.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealitySkepticalist;

impl Persona for RealitySkepticalist {
    fn name(&self) -> &str {
        "reality_skepticalist"
    }

    fn focus(&self) -> &str {
        "primary sources, fact checks, and verifiable evidence"
    }

    fn expand(&self, original: &SerpQuery, _ctx: &ExpandContext) -> SerpQuery {
        SerpQuery::new(format!("{} fact check primary source", original.q))
    }
}

/// All seven built-in personas, in registration order.
pub fn builtin_personas() -> Vec<Box<dyn Persona>> {
    vec![
        Box::new(ExpertSkeptic),
        Box::new(DetailAnalyst),
        Box::new(HistoricalResearcher),
        Box::new(ComparativeThinker),
        Box::new(TemporalContext),
        Box::new(Globalizer),
        Box::new(RealitySkepticalist),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::types::{ExpandContext, FixedClock};
    use chrono::TimeZone;
    use chrono::Utc;
    use std::sync::Arc;

    fn fixed_ctx(topic: TopicCategory) -> ExpandContext {
        ExpandContext::for_topic(topic)
            .with_clock(Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            )))
    }

    #[test]
    fn test_temporal_context_uses_injected_clock() {
        let ctx = fixed_ctx(TopicCategory::Technology);
        let q = TemporalContext.expand(&SerpQuery::new("rust release"), &ctx);
        assert_eq!(q.q, "rust release 2025");
        assert_eq!(q.tbs.as_deref(), Some("qdr:m"));

        // Deterministic given a fixed clock.
        let again = TemporalContext.expand(&SerpQuery::new("rust release"), &ctx);
        assert_eq!(q, again);
    }

    #[test]
    fn test_temporal_context_topic_filters() {
        let finance = TemporalContext.expand(
            &SerpQuery::new("eur usd rate"),
            &fixed_ctx(TopicCategory::Finance),
        );
        assert_eq!(finance.tbs.as_deref(), Some("qdr:h"));

        let general = TemporalContext.expand(
            &SerpQuery::new("sky color"),
            &fixed_ctx(TopicCategory::General),
        );
        assert_eq!(general.tbs.as_deref(), Some("qdr:y"));
    }

    #[test]
    fn test_globalizer_sets_region_identity_translation() {
        let ctx = fixed_ctx(TopicCategory::Science);
        let q = Globalizer.expand(&SerpQuery::new("muon g-2 anomaly"), &ctx);
        assert_eq!(q.location.as_deref(), Some("de"));
        // Identity translator leaves the text unchanged.
        assert_eq!(q.q, "muon g-2 anomaly");
    }

    #[test]
    fn test_builtin_set() {
        let personas = builtin_personas();
        assert_eq!(personas.len(), 7);
        for p in &personas {
            assert!(p.focus().len() >= 10);
            assert!((0.0..=2.0).contains(&p.weight()));
        }
        assert_eq!(personas[4].name(), "temporal_context");
        assert!((personas[4].weight() - 1.2).abs() < 1e-12);
    }
}
