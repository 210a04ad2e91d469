//! Semantic deduplication of candidate search queries.
//!
//! Candidates are compared by embedding similarity against every query
//! already executed this session and against earlier accepted candidates
//! in the same batch. When the embedding provider fails, the gate
//! degrades to exact-string dedup and says so on the event bus.

use std::sync::Arc;
use tracing::warn;

use crate::budget::BudgetTracker;
use crate::contracts::embedding::EmbeddingClient;
use crate::contracts::search::SerpQuery;
use crate::events::EventBus;
use crate::persona::types::WeightedQuery;
use crate::similarity::{dedup_against, DEFAULT_DEDUP_THRESHOLD};

/// Result of one dedup pass.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Accepted candidates, in input order.
    pub accepted: Vec<WeightedQuery>,
    /// Rejected near-duplicates, in input order.
    pub rejected: Vec<WeightedQuery>,
    /// True when the gate fell back to exact-string matching.
    pub degraded: bool,
}

/// Embedding-backed near-duplicate gate.
pub struct QueryDedupGate {
    embedder: Arc<dyn EmbeddingClient>,
    threshold: f32,
    bus: Option<EventBus>,
    tracker: Option<BudgetTracker>,
}

impl QueryDedupGate {
    pub fn new(embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            embedder,
            threshold: DEFAULT_DEDUP_THRESHOLD,
            bus: None,
            tracker: None,
        }
    }

    /// Override the similarity threshold (inclusive).
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_tracker(mut self, tracker: BudgetTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Filter a candidate batch against previously executed queries.
    ///
    /// Candidates are judged in batch order; an accepted candidate joins
    /// the comparison pool for the rest of the batch.
    pub async fn filter(
        &self,
        candidates: Vec<WeightedQuery>,
        executed: &[SerpQuery],
    ) -> DedupOutcome {
        if candidates.is_empty() {
            return DedupOutcome::default();
        }

        let mut texts: Vec<String> = executed.iter().map(|q| q.q.clone()).collect();
        texts.extend(candidates.iter().map(|c| c.query.q.clone()));

        match self.embedder.embed(&texts).await {
            Ok(batch) if batch.embeddings.len() == texts.len() => {
                if let Some(tracker) = &self.tracker {
                    tracker.record(batch.usage.clone());
                }
                self.filter_by_embedding(candidates, batch.embeddings, executed.len())
            }
            Ok(batch) => {
                warn!(
                    expected = texts.len(),
                    got = batch.embeddings.len(),
                    "embedding provider returned wrong count, degrading to exact-string dedup"
                );
                self.degraded_filter(candidates, executed)
            }
            Err(e) => {
                warn!(error = %e, "embedding provider failed, degrading to exact-string dedup");
                self.degraded_filter(candidates, executed)
            }
        }
    }

    fn filter_by_embedding(
        &self,
        candidates: Vec<WeightedQuery>,
        mut embeddings: Vec<Vec<f32>>,
        executed_count: usize,
    ) -> DedupOutcome {
        let candidate_embs = embeddings.split_off(executed_count);
        let mut pool = embeddings; // executed queries
        let mut outcome = DedupOutcome::default();

        for (candidate, emb) in candidates.into_iter().zip(candidate_embs) {
            if dedup_against(&emb, &pool, self.threshold) {
                outcome.rejected.push(candidate);
            } else {
                pool.push(emb);
                outcome.accepted.push(candidate);
            }
        }
        self.report(&outcome);
        outcome
    }

    fn degraded_filter(&self, candidates: Vec<WeightedQuery>, executed: &[SerpQuery]) -> DedupOutcome {
        let mut seen: Vec<String> = executed.iter().map(|q| q.normalized()).collect();
        let mut outcome = DedupOutcome {
            degraded: true,
            ..DedupOutcome::default()
        };

        for candidate in candidates {
            let key = candidate.query.normalized();
            if seen.contains(&key) {
                outcome.rejected.push(candidate);
            } else {
                seen.push(key);
                outcome.accepted.push(candidate);
            }
        }

        if let Some(bus) = &self.bus {
            bus.warning("query dedup degraded to exact-string matching");
        }
        self.report(&outcome);
        outcome
    }

    fn report(&self, outcome: &DedupOutcome) {
        if outcome.rejected.is_empty() {
            return;
        }
        if let Some(bus) = &self.bus {
            bus.info(format!(
                "dropped {} near-duplicate quer{}",
                outcome.rejected.len(),
                if outcome.rejected.len() == 1 { "y" } else { "ies" }
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::UsageRecord;
    use crate::contracts::embedding::EmbeddingBatch;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Maps exact texts to fixed vectors; unknown texts get an orthogonal
    /// one-hot vector.
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
    }

    #[async_trait]
    impl EmbeddingClient for TableEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
            let embeddings = texts
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    self.table.get(t).cloned().unwrap_or_else(|| {
                        let mut v = vec![0.0; 8];
                        v[i % 8] = 1.0;
                        v
                    })
                })
                .collect();
            Ok(EmbeddingBatch {
                embeddings,
                usage: UsageRecord::new("embedding", texts.len() as u64 * 3, 0),
            })
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingClient for FailingEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, _texts: &[String]) -> Result<EmbeddingBatch> {
            Err(Error::transient("embedding", "503"))
        }
    }

    fn wq(q: &str) -> WeightedQuery {
        WeightedQuery {
            query: SerpQuery::new(q),
            weight: 1.0,
            source_persona: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_near_duplicates_rejected_in_batch_order() {
        // Two queries differing only in stop-words, cosine 0.92.
        let mut table = HashMap::new();
        table.insert("best rust database".to_string(), vec![1.0, 0.0, 0.2, 0.0]);
        table.insert(
            "the best rust database".to_string(),
            vec![1.0, 0.12, 0.0, 0.35],
        );
        let sim = crate::similarity::cosine(
            &table["best rust database"],
            &table["the best rust database"],
        );
        assert!(sim > 0.9 && sim < 0.95);

        let gate = QueryDedupGate::new(Arc::new(TableEmbedder { table }));
        let outcome = gate
            .filter(
                vec![wq("best rust database"), wq("the best rust database")],
                &[],
            )
            .await;

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].query.q, "best rust database");
        assert_eq!(outcome.rejected.len(), 1);
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn test_rejects_against_executed_queries() {
        let mut table = HashMap::new();
        table.insert("rust async".to_string(), vec![1.0, 0.0]);
        table.insert("rust async runtime".to_string(), vec![0.99, 0.05]);

        let gate = QueryDedupGate::new(Arc::new(TableEmbedder { table }));
        let outcome = gate
            .filter(
                vec![wq("rust async runtime")],
                &[SerpQuery::new("rust async")],
            )
            .await;

        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[tokio::test]
    async fn test_idempotent_on_accepted_set() {
        let gate = QueryDedupGate::new(Arc::new(TableEmbedder {
            table: HashMap::new(),
        }));
        // One-hot vectors are mutually orthogonal: everything is accepted.
        let first = gate
            .filter(vec![wq("alpha"), wq("beta"), wq("gamma")], &[])
            .await;
        assert_eq!(first.accepted.len(), 3);

        let again = gate.filter(first.accepted.clone(), &[]).await;
        assert_eq!(again.accepted, first.accepted);
        assert!(again.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_mode_on_provider_failure() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let gate = QueryDedupGate::new(Arc::new(FailingEmbedder)).with_bus(bus);

        let outcome = gate
            .filter(
                vec![wq("Rust   Databases"), wq("rust databases"), wq("other")],
                &[],
            )
            .await;

        assert!(outcome.degraded);
        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.event, crate::events::AgentEvent::Warning(_)));
    }

    #[tokio::test]
    async fn test_records_embedding_usage() {
        let tracker = BudgetTracker::new(1_000);
        let gate = QueryDedupGate::new(Arc::new(TableEmbedder {
            table: HashMap::new(),
        }))
        .with_tracker(tracker.clone());

        gate.filter(vec![wq("a"), wq("b")], &[]).await;
        assert_eq!(tracker.total_tokens(), 6);
    }
}
