//! Session persistence value and text-log rendering.
//!
//! A session serialises to one JSON object; writing it anywhere is the
//! embedder's job. The text rendering produces the banner-sectioned
//! human-readable log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// Per-persona activity totals for the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaStats {
    pub expansions: u64,
    pub searches: u64,
    pub tokens: u64,
}

/// Wall-clock totals by phase, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTiming {
    pub total_ms: u64,
    pub search_ms: u64,
    pub read_ms: u64,
    pub llm_ms: u64,
}

/// Headline counters for the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub steps: u32,
    pub urls_found: usize,
    pub tokens_used: u64,
}

/// One parallel batch executed during the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub label: String,
    pub size: usize,
    pub succeeded: usize,
}

/// One sub-task executed during the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub label: String,
    pub ok: bool,
    pub duration_ms: u64,
}

/// The full session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub question: String,
    pub answer: Option<String>,
    /// Rendered as "Title — URL".
    pub references: Vec<String>,
    pub visited_urls: Vec<String>,
    pub logs: Vec<LogLine>,
    pub personas: HashMap<String, PersonaStats>,
    pub timing: SessionTiming,
    pub stats: SessionStats,
    pub success: bool,
    pub error: Option<String>,
    pub parallel_batches: Vec<BatchRecord>,
    pub all_tasks: Vec<TaskRecord>,
}

impl SessionRecord {
    /// Start an empty record for a question.
    pub fn begin(question: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            question: question.into(),
            answer: None,
            references: Vec::new(),
            visited_urls: Vec::new(),
            logs: Vec::new(),
            personas: HashMap::new(),
            timing: SessionTiming::default(),
            stats: SessionStats::default(),
            success: false,
            error: None,
            parallel_batches: Vec::new(),
            all_tasks: Vec::new(),
        }
    }

    pub fn log(&mut self, level: &str, message: impl Into<String>) {
        self.logs.push(LogLine {
            timestamp: Utc::now(),
            level: level.to_string(),
            message: message.into(),
        });
    }

    /// Format a reference line as stored in `references`.
    pub fn reference_line(title: Option<&str>, url: &str) -> String {
        match title {
            Some(title) if !title.is_empty() => format!("{title} — {url}"),
            _ => url.to_string(),
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Human-readable log with section banners.
    pub fn render_text_log(&self) -> String {
        let mut out = String::new();
        let banner = |title: &str| {
            format!(
                "\n==============================\n {title}\n==============================\n"
            )
        };

        out.push_str(&banner("SESSION"));
        out.push_str(&format!("id: {}\n", self.id));
        out.push_str(&format!("question: {}\n", self.question));
        out.push_str(&format!("started: {}\n", self.started_at.to_rfc3339()));
        out.push_str(&format!("finished: {}\n", self.finished_at.to_rfc3339()));
        out.push_str(&format!("success: {}\n", self.success));
        if let Some(error) = &self.error {
            out.push_str(&format!("error: {error}\n"));
        }

        out.push_str(&banner("ANSWER"));
        out.push_str(self.answer.as_deref().unwrap_or("(none)"));
        out.push('\n');

        if !self.references.is_empty() {
            out.push_str(&banner("REFERENCES"));
            for r in &self.references {
                out.push_str(&format!("- {r}\n"));
            }
        }

        if !self.visited_urls.is_empty() {
            out.push_str(&banner("VISITED URLS"));
            for url in &self.visited_urls {
                out.push_str(&format!("- {url}\n"));
            }
        }

        out.push_str(&banner("STATS"));
        out.push_str(&format!(
            "steps: {} | urls found: {} | tokens used: {}\n",
            self.stats.steps, self.stats.urls_found, self.stats.tokens_used
        ));
        out.push_str(&format!(
            "timing: total {}ms, search {}ms, read {}ms, llm {}ms\n",
            self.timing.total_ms, self.timing.search_ms, self.timing.read_ms, self.timing.llm_ms
        ));

        if !self.personas.is_empty() {
            out.push_str(&banner("PERSONAS"));
            let mut names: Vec<&String> = self.personas.keys().collect();
            names.sort();
            for name in names {
                let stats = &self.personas[name];
                out.push_str(&format!(
                    "{name}: {} expansions, {} searches, {} tokens\n",
                    stats.expansions, stats.searches, stats.tokens
                ));
            }
        }

        if !self.logs.is_empty() {
            out.push_str(&banner("LOG"));
            for line in &self.logs {
                out.push_str(&format!(
                    "[{}] {:<7} {}\n",
                    line.timestamp.format("%H:%M:%S%.3f"),
                    line.level,
                    line.message
                ));
            }
        }

        out
    }
}
