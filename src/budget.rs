//! Token budget accounting for a research session.
//!
//! Every call that crosses the process boundary reports its usage here.
//! Writes serialise through a mutex; readers get a consistent snapshot.
//! The tracker is a per-session value passed in, never process-wide.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::events::{AgentEvent, EventBus};

/// Usage reported by a single external call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Tool that incurred the usage ("llm", "embedding", "search", ...).
    pub tool: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageRecord {
    pub fn new(tool: impl Into<String>, prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            tool: tool.into(),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Accumulated usage for one tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub calls: u64,
}

/// Consistent point-in-time view of the tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub budget: u64,
    pub total_tokens: u64,
    pub by_tool: HashMap<String, ToolUsage>,
}

impl BudgetSnapshot {
    /// Fraction of the budget consumed, in [0, ∞).
    pub fn fraction_used(&self) -> f64 {
        if self.budget == 0 {
            return if self.total_tokens == 0 { 0.0 } else { f64::INFINITY };
        }
        self.total_tokens as f64 / self.budget as f64
    }
}

#[derive(Debug, Default)]
struct TrackerInner {
    total_tokens: u64,
    by_tool: HashMap<String, ToolUsage>,
}

/// Thread-safe token budget tracker.
///
/// Cheap to clone; clones share state. No retries and no rate limiting
/// live here — only accounting.
#[derive(Clone)]
pub struct BudgetTracker {
    budget: u64,
    inner: Arc<Mutex<TrackerInner>>,
    bus: Option<EventBus>,
}

impl BudgetTracker {
    /// Create a tracker for the given token budget.
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            inner: Arc::new(Mutex::new(TrackerInner::default())),
            bus: None,
        }
    }

    /// Attach an event bus; a TokenUsage event is emitted on every record.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// The configured token ceiling.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Record usage from one call.
    pub fn record(&self, usage: UsageRecord) {
        let total = {
            let mut inner = self.inner.lock().expect("budget tracker poisoned");
            inner.total_tokens += usage.total_tokens;
            let entry = inner.by_tool.entry(usage.tool.clone()).or_default();
            entry.prompt_tokens += usage.prompt_tokens;
            entry.completion_tokens += usage.completion_tokens;
            entry.total_tokens += usage.total_tokens;
            entry.calls += 1;
            inner.total_tokens
        };
        if let Some(bus) = &self.bus {
            bus.emit(AgentEvent::TokenUsage(total));
        }
    }

    /// Total tokens recorded so far.
    pub fn total_tokens(&self) -> u64 {
        self.inner.lock().expect("budget tracker poisoned").total_tokens
    }

    /// Fraction of the budget consumed.
    pub fn fraction_used(&self) -> f64 {
        self.snapshot().fraction_used()
    }

    /// Consistent snapshot of totals and the per-tool breakdown.
    pub fn snapshot(&self) -> BudgetSnapshot {
        let inner = self.inner.lock().expect("budget tracker poisoned");
        BudgetSnapshot {
            budget: self.budget,
            total_tokens: inner.total_tokens,
            by_tool: inner.by_tool.clone(),
        }
    }
}

impl std::fmt::Debug for BudgetTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("BudgetTracker")
            .field("budget", &snap.budget)
            .field("total_tokens", &snap.total_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let tracker = BudgetTracker::new(1_000);
        tracker.record(UsageRecord::new("llm", 100, 50));
        tracker.record(UsageRecord::new("llm", 10, 5));
        tracker.record(UsageRecord::new("embedding", 30, 0));

        let snap = tracker.snapshot();
        assert_eq!(snap.total_tokens, 195);
        assert_eq!(snap.by_tool["llm"].calls, 2);
        assert_eq!(snap.by_tool["llm"].total_tokens, 165);
        assert_eq!(snap.by_tool["embedding"].prompt_tokens, 30);
    }

    #[test]
    fn test_fraction_used_boundaries() {
        let tracker = BudgetTracker::new(100_000);
        tracker.record(UsageRecord::new("llm", 84_900, 0));
        assert!(tracker.fraction_used() < 0.85);
        tracker.record(UsageRecord::new("llm", 100, 0));
        assert!(tracker.fraction_used() >= 0.85);
    }

    #[test]
    fn test_zero_budget() {
        let tracker = BudgetTracker::new(0);
        assert_eq!(tracker.fraction_used(), 0.0);
        tracker.record(UsageRecord::new("llm", 1, 0));
        assert!(tracker.fraction_used().is_infinite());
    }

    #[test]
    fn test_monotonic_total() {
        let tracker = BudgetTracker::new(1_000);
        let mut last = 0;
        for i in 0..20 {
            tracker.record(UsageRecord::new("search", i, i));
            let now = tracker.total_tokens();
            assert!(now >= last);
            last = now;
        }
    }

    #[tokio::test]
    async fn test_emits_event_per_record() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let tracker = BudgetTracker::new(1_000).with_bus(bus);

        tracker.record(UsageRecord::new("llm", 10, 10));
        tracker.record(UsageRecord::new("llm", 5, 5));

        assert_eq!(rx.recv().await.unwrap().event, AgentEvent::TokenUsage(20));
        assert_eq!(rx.recv().await.unwrap().event, AgentEvent::TokenUsage(30));
    }

    #[test]
    fn test_parallel_appends() {
        let tracker = BudgetTracker::new(1_000_000);
        std::thread::scope(|s| {
            for _ in 0..8 {
                let t = tracker.clone();
                s.spawn(move || {
                    for _ in 0..100 {
                        t.record(UsageRecord::new("llm", 3, 2));
                    }
                });
            }
        });
        assert_eq!(tracker.total_tokens(), 8 * 100 * 5);
    }
}
