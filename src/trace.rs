//! Structured traces and evidence reports.
//!
//! Every search call, evaluator run, and persona expansion leaves a
//! record here; aggregators turn them into latency percentiles, success
//! rates, and per-session evidence reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::evaluate::types::EvaluationType;
use crate::persona::types::PersonaExecutionMetrics;

/// SHA-256 hex digest of an answer, for trace correlation without
/// storing the full text twice.
pub fn answer_hash(answer: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(answer.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Record of one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTrace {
    pub trace_id: Uuid,
    /// Persona or subsystem that originated the query.
    pub origin: String,
    pub query: String,
    pub api: String,
    pub request_ts: DateTime<Utc>,
    pub response_ts: DateTime<Utc>,
    pub results_count: usize,
    pub bytes: u64,
    pub urls_extracted: usize,
}

impl SearchTrace {
    pub fn latency_ms(&self) -> u64 {
        (self.response_ts - self.request_ts).num_milliseconds().max(0) as u64
    }
}

/// Record of one evaluator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTrace {
    pub trace_id: Uuid,
    pub eval_type: EvaluationType,
    pub question: String,
    pub answer_hash: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tokens_used: u64,
    pub passed: bool,
    pub confidence: f64,
    pub reasoning_length: usize,
}

impl EvaluationTrace {
    pub fn latency_ms(&self) -> u64 {
        (self.end - self.start).num_milliseconds().max(0) as u64
    }
}

/// Latency distribution summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

/// Nearest-rank percentile over raw millisecond samples.
pub fn percentiles(samples: &[u64]) -> LatencyPercentiles {
    if samples.is_empty() {
        return LatencyPercentiles::default();
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let rank = |p: f64| -> u64 {
        let idx = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        sorted[idx.clamp(1, sorted.len()) - 1]
    };
    LatencyPercentiles {
        p50_ms: rank(50.0),
        p95_ms: rank(95.0),
        p99_ms: rank(99.0),
    }
}

/// Evidence bundle for the session's search activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEvidenceReport {
    pub traces: Vec<SearchTrace>,
    pub latency: LatencyPercentiles,
    pub total_bytes: u64,
    pub total_urls_extracted: usize,
}

/// Evidence bundle for the session's evaluation activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationEvidenceReport {
    pub traces: Vec<EvaluationTrace>,
    pub latency: LatencyPercentiles,
    pub pass_rate: f64,
    pub tokens_per_eval: f64,
    /// Hit rate of the required-evaluations fallback cache, if used.
    pub cache_hit_rate: Option<f64>,
}

#[derive(Debug, Default)]
struct TraceLogInner {
    searches: Vec<SearchTrace>,
    evaluations: Vec<EvaluationTrace>,
    personas: Vec<PersonaExecutionMetrics>,
    cache_hits: u64,
    cache_misses: u64,
}

/// Per-session trace sink. Cheap to clone; writes serialise internally.
#[derive(Clone, Default)]
pub struct TraceLog {
    inner: Arc<Mutex<TraceLogInner>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_search(&self, trace: SearchTrace) {
        self.inner.lock().expect("trace log poisoned").searches.push(trace);
    }

    pub fn record_evaluation(&self, trace: EvaluationTrace) {
        self.inner
            .lock()
            .expect("trace log poisoned")
            .evaluations
            .push(trace);
    }

    pub fn record_personas(&self, metrics: impl IntoIterator<Item = PersonaExecutionMetrics>) {
        self.inner
            .lock()
            .expect("trace log poisoned")
            .personas
            .extend(metrics);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let mut inner = self.inner.lock().expect("trace log poisoned");
        if hit {
            inner.cache_hits += 1;
        } else {
            inner.cache_misses += 1;
        }
    }

    pub fn search_count(&self) -> usize {
        self.inner.lock().expect("trace log poisoned").searches.len()
    }

    pub fn evaluation_count(&self) -> usize {
        self.inner.lock().expect("trace log poisoned").evaluations.len()
    }

    pub fn persona_metrics(&self) -> Vec<PersonaExecutionMetrics> {
        self.inner.lock().expect("trace log poisoned").personas.clone()
    }

    /// Build the search evidence report for the session.
    pub fn search_evidence(&self) -> SearchEvidenceReport {
        let inner = self.inner.lock().expect("trace log poisoned");
        let samples: Vec<u64> = inner.searches.iter().map(SearchTrace::latency_ms).collect();
        SearchEvidenceReport {
            latency: percentiles(&samples),
            total_bytes: inner.searches.iter().map(|t| t.bytes).sum(),
            total_urls_extracted: inner.searches.iter().map(|t| t.urls_extracted).sum(),
            traces: inner.searches.clone(),
        }
    }

    /// Build the evaluation evidence report for the session.
    pub fn evaluation_evidence(&self) -> EvaluationEvidenceReport {
        let inner = self.inner.lock().expect("trace log poisoned");
        let samples: Vec<u64> = inner
            .evaluations
            .iter()
            .map(EvaluationTrace::latency_ms)
            .collect();
        let total = inner.evaluations.len();
        let passed = inner.evaluations.iter().filter(|t| t.passed).count();
        let tokens: u64 = inner.evaluations.iter().map(|t| t.tokens_used).sum();
        let lookups = inner.cache_hits + inner.cache_misses;
        EvaluationEvidenceReport {
            latency: percentiles(&samples),
            pass_rate: if total == 0 {
                0.0
            } else {
                passed as f64 / total as f64
            },
            tokens_per_eval: if total == 0 {
                0.0
            } else {
                tokens as f64 / total as f64
            },
            cache_hit_rate: (lookups > 0).then(|| inner.cache_hits as f64 / lookups as f64),
            traces: inner.evaluations.clone(),
        }
    }
}

impl std::fmt::Debug for TraceLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceLog")
            .field("searches", &self.search_count())
            .field("evaluations", &self.evaluation_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn search_trace(latency_ms: i64) -> SearchTrace {
        SearchTrace {
            trace_id: Uuid::new_v4(),
            origin: "expert_skeptic".into(),
            query: "q".into(),
            api: "serp".into(),
            request_ts: ts(0),
            response_ts: ts(latency_ms),
            results_count: 3,
            bytes: 100,
            urls_extracted: 3,
        }
    }

    #[test]
    fn test_answer_hash_stable() {
        assert_eq!(answer_hash("abc"), answer_hash("abc"));
        assert_ne!(answer_hash("abc"), answer_hash("abd"));
        assert_eq!(answer_hash("").len(), 64);
    }

    #[test]
    fn test_percentiles_nearest_rank() {
        let samples: Vec<u64> = (1..=100).collect();
        let p = percentiles(&samples);
        assert_eq!(p.p50_ms, 50);
        assert_eq!(p.p95_ms, 95);
        assert_eq!(p.p99_ms, 99);

        assert_eq!(percentiles(&[]), LatencyPercentiles::default());
        let single = percentiles(&[7]);
        assert_eq!(single.p50_ms, 7);
        assert_eq!(single.p99_ms, 7);
    }

    #[test]
    fn test_search_evidence_aggregation() {
        let log = TraceLog::new();
        log.record_search(search_trace(10));
        log.record_search(search_trace(30));

        let report = log.search_evidence();
        assert_eq!(report.traces.len(), 2);
        assert_eq!(report.total_bytes, 200);
        assert_eq!(report.total_urls_extracted, 6);
        assert_eq!(report.latency.p50_ms, 10);
    }

    #[test]
    fn test_evaluation_evidence_rates() {
        let log = TraceLog::new();
        for (passed, tokens) in [(true, 100u64), (false, 50), (true, 150)] {
            log.record_evaluation(EvaluationTrace {
                trace_id: Uuid::new_v4(),
                eval_type: EvaluationType::Definitive,
                question: "q".into(),
                answer_hash: answer_hash("a"),
                start: ts(0),
                end: ts(5),
                tokens_used: tokens,
                passed,
                confidence: 0.8,
                reasoning_length: 20,
            });
        }
        log.record_cache_lookup(true);
        log.record_cache_lookup(false);

        let report = log.evaluation_evidence();
        assert!((report.pass_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((report.tokens_per_eval - 100.0).abs() < 1e-9);
        assert_eq!(report.cache_hit_rate, Some(0.5));
    }
}
