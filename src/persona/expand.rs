//! Parallel persona expansion.
//!
//! Expansion is CPU work and runs on the rayon work-stealing pool, not
//! the I/O runtime. Personas receive an immutable context snapshot; the
//! caller merges results back.

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::contracts::search::SerpQuery;

use super::registry::PersonaRegistry;
use super::types::{ExpandContext, Persona, PersonaExecutionMetrics, WeightedQuery};

/// Result of expanding one input query across all personas.
#[derive(Debug, Clone, Default)]
pub struct ExpansionOutcome {
    /// Deduplicated weighted queries, one per distinct normalized string.
    pub queries: Vec<WeightedQuery>,
    /// One metrics record per persona execution, in registration order.
    pub metrics: Vec<PersonaExecutionMetrics>,
}

/// Applies every registered persona to input queries in parallel.
pub struct PersonaOrchestrator {
    registry: PersonaRegistry,
}

impl PersonaOrchestrator {
    pub fn new(registry: PersonaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PersonaRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PersonaRegistry {
        &mut self.registry
    }

    /// Expand one query with all active personas concurrently.
    ///
    /// When several personas produce the same normalized query string,
    /// the instance with the highest weight wins; ties keep the earliest
    /// registered persona.
    pub fn expand_parallel(&self, query: &SerpQuery, ctx: &ExpandContext) -> ExpansionOutcome {
        let personas = self.registry.active();
        // par_iter preserves collection order, so results come back in
        // registration order regardless of which worker ran them.
        let raw: Vec<(WeightedQuery, PersonaExecutionMetrics)> = personas
            .par_iter()
            .map(|persona| run_one(persona, query, ctx))
            .collect();
        collapse(raw)
    }

    /// Expand a batch of queries, parallelising across queries as well.
    ///
    /// Output preserves input query order; dedup applies across the whole
    /// batch.
    pub fn expand_batch(&self, queries: &[SerpQuery], ctx: &ExpandContext) -> ExpansionOutcome {
        let personas = self.registry.active();
        let raw: Vec<(WeightedQuery, PersonaExecutionMetrics)> = queries
            .par_iter()
            .flat_map(|query| {
                personas
                    .par_iter()
                    .map(|persona| run_one(persona, query, ctx))
                    .collect::<Vec<_>>()
            })
            .collect();
        collapse(raw)
    }
}

fn run_one(
    persona: &Arc<dyn Persona>,
    query: &SerpQuery,
    ctx: &ExpandContext,
) -> (WeightedQuery, PersonaExecutionMetrics) {
    let start = ctx.clock.now();
    let expanded = persona.expand(query, ctx);
    let end = ctx.clock.now();
    let weighted = WeightedQuery {
        query: expanded.clone(),
        weight: persona.weight(),
        source_persona: persona.name().to_string(),
    };
    let metrics = PersonaExecutionMetrics {
        persona_name: persona.name().to_string(),
        start,
        end,
        input: query.q.clone(),
        output_query: expanded,
    };
    (weighted, metrics)
}

fn collapse(raw: Vec<(WeightedQuery, PersonaExecutionMetrics)>) -> ExpansionOutcome {
    let mut queries: Vec<WeightedQuery> = Vec::new();
    let mut by_normalized: HashMap<String, usize> = HashMap::new();
    let mut metrics = Vec::with_capacity(raw.len());

    for (weighted, metric) in raw {
        metrics.push(metric);
        let key = weighted.query.normalized();
        match by_normalized.get(&key) {
            // Strictly greater replaces; equal keeps the earlier entry.
            Some(&idx) if weighted.weight > queries[idx].weight => {
                queries[idx] = weighted;
            }
            Some(_) => {}
            None => {
                by_normalized.insert(key, queries.len());
                queries.push(weighted);
            }
        }
    }

    ExpansionOutcome { queries, metrics }
}
