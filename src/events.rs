//! Progress event bus for observable session execution.
//!
//! Events are emitted to a sink-agnostic channel that any observer (TUI,
//! logger, test harness) can subscribe to. Emission is non-blocking: when
//! the channel is congested, droppable events are shed before essential
//! ones (Error, Complete), and ordering of delivered events is preserved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Per-persona activity counters surfaced to observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaActivity {
    pub name: String,
    pub searches: u64,
    pub reads: u64,
    pub answers: u64,
    pub tokens: u64,
    pub active: bool,
}

/// Events emitted during a research session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
    /// The step counter advanced.
    StepChanged(u32),
    /// The LLM chose an action for this step.
    ActionChosen(String),
    /// Model reasoning surfaced for display.
    Think(String),
    /// URL store counts changed.
    UrlCounts { total: usize, visited: usize },
    /// Cumulative token usage changed.
    TokenUsage(u64),
    /// Persona activity snapshot.
    PersonaStats(PersonaActivity),
    /// A URL was read and marked visited.
    VisitedUrl(String),
    /// A parallel batch began.
    BatchStart { label: String, size: usize },
    /// One task within a parallel batch finished.
    BatchTask { label: String, index: usize, ok: bool },
    /// A parallel batch completed.
    BatchEnd { label: String },
    /// The session reached a terminal answer.
    Complete { answer: String, trivial: bool },
}

impl AgentEvent {
    /// Essential events survive backpressure shedding.
    pub fn is_essential(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Complete { .. })
    }

    /// Short name for log lines and traces.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Info(_) => "info",
            Self::Success(_) => "success",
            Self::Warning(_) => "warning",
            Self::Error(_) => "error",
            Self::StepChanged(_) => "step_changed",
            Self::ActionChosen(_) => "action_chosen",
            Self::Think(_) => "think",
            Self::UrlCounts { .. } => "url_counts",
            Self::TokenUsage(_) => "token_usage",
            Self::PersonaStats(_) => "persona_stats",
            Self::VisitedUrl(_) => "visited_url",
            Self::BatchStart { .. } => "batch_start",
            Self::BatchTask { .. } => "batch_task",
            Self::BatchEnd { .. } => "batch_end",
            Self::Complete { .. } => "complete",
        }
    }
}

/// A timestamped event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedEvent {
    pub event: AgentEvent,
    pub timestamp: DateTime<Utc>,
}

impl StampedEvent {
    /// Format as a single-line log entry.
    pub fn as_log_line(&self) -> String {
        let detail = match &self.event {
            AgentEvent::Info(s)
            | AgentEvent::Success(s)
            | AgentEvent::Warning(s)
            | AgentEvent::Error(s)
            | AgentEvent::Think(s) => s.clone(),
            AgentEvent::ActionChosen(name) => name.clone(),
            AgentEvent::StepChanged(n) => n.to_string(),
            AgentEvent::UrlCounts { total, visited } => format!("{visited}/{total}"),
            AgentEvent::TokenUsage(total) => total.to_string(),
            AgentEvent::PersonaStats(p) => p.name.clone(),
            AgentEvent::VisitedUrl(url) => url.clone(),
            AgentEvent::BatchStart { label, size } => format!("{label} x{size}"),
            AgentEvent::BatchTask { label, index, ok } => {
                format!("{label}[{index}] {}", if *ok { "ok" } else { "failed" })
            }
            AgentEvent::BatchEnd { label } => label.clone(),
            AgentEvent::Complete { trivial, .. } => {
                if *trivial {
                    "trivial".to_string()
                } else {
                    "evaluated".to_string()
                }
            }
        };
        format!(
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.event.kind(),
            detail.lines().next().unwrap_or("")
        )
    }
}

/// Default channel capacity for a session bus.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Per-session event bus.
///
/// Cheap to clone; all clones share the underlying channel. Created per
/// session and passed in, never process-wide.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StampedEvent>,
    soft_capacity: usize,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Create a bus with an explicit channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(8));
        Self {
            tx,
            soft_capacity: capacity.max(8),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StampedEvent> {
        self.tx.subscribe()
    }

    /// Emit an event without blocking.
    ///
    /// Droppable events are shed when the channel is near capacity;
    /// essential events are always offered. Events that are sent keep
    /// their emission order.
    pub fn emit(&self, event: AgentEvent) {
        if !event.is_essential() && self.tx.len() >= self.soft_capacity.saturating_sub(8) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let stamped = StampedEvent {
            event,
            timestamp: Utc::now(),
        };
        // A send error only means there are no subscribers; emission is
        // fire-and-forget either way.
        let _ = self.tx.send(stamped);
    }

    /// Number of droppable events shed under backpressure.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.emit(AgentEvent::Info(msg.into()));
    }

    pub fn success(&self, msg: impl Into<String>) {
        self.emit(AgentEvent::Success(msg.into()));
    }

    pub fn warning(&self, msg: impl Into<String>) {
        self.emit(AgentEvent::Warning(msg.into()));
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.emit(AgentEvent::Error(msg.into()));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("soft_capacity", &self.soft_capacity)
            .field("dropped", &self.dropped_count())
            .finish()
    }
}
