//! Rule-based question and answer classification.
//!
//! Deterministic keyword-and-structure analysis shared by the persona
//! expansion and the evaluators: topic categories, requested item counts,
//! aspect decomposition, hedging and recency markers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Topic category used for freshness thresholds and region hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    Finance,
    News,
    Technology,
    Science,
    History,
    General,
}

static FINANCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(stock|stocks|share price|market cap|exchange rate|crypto|bitcoin|interest rate|inflation|earnings|dividend|nasdaq|ticker)\b").unwrap()
});
static NEWS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(news|headline|breaking|election|announced today|just announced|press release)\b")
        .unwrap()
});
static TECH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(software|library|framework|api|compiler|programming|database|kernel|release notes|version|sdk|cloud|open.?source)\b").unwrap()
});
static SCIENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(study|studies|research|experiment|physics|biology|chemistry|astronomy|clinical|peer.?reviewed|theorem)\b").unwrap()
});
static HISTORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(history|historical|ancient|medieval|century|founded|empire|world war|dynasty)\b")
        .unwrap()
});

/// Classify a question into a topic category.
///
/// First match wins in a fixed order, so the result is stable for a
/// given input.
pub fn classify_topic(text: &str) -> TopicCategory {
    if FINANCE_RE.is_match(text) {
        TopicCategory::Finance
    } else if NEWS_RE.is_match(text) {
        TopicCategory::News
    } else if HISTORY_RE.is_match(text) {
        TopicCategory::History
    } else if TECH_RE.is_match(text) {
        TopicCategory::Technology
    } else if SCIENCE_RE.is_match(text) {
        TopicCategory::Science
    } else {
        TopicCategory::General
    }
}

static COUNT_BEFORE_NOUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten|dozen)\s+(?:best\s+|open.?source\s+|free\s+|popular\s+|different\s+)*(?:items?|examples?|reasons?|ways?|types?|options?|databases?|tools?|libraries|methods?|steps?|tips?|languages?|frameworks?|books?|countries|companies|projects?)\b").unwrap()
});
static LIST_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:list|top|name|give\s+me|enumerate)\s+(?:the\s+)?(\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten|dozen)\b").unwrap()
});

fn parse_count(word: &str) -> Option<usize> {
    if let Ok(n) = word.parse::<usize>() {
        return Some(n);
    }
    let n = match word.to_lowercase().as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "dozen" => 12,
        _ => return None,
    };
    Some(n)
}

/// Number of items a question syntactically requests, if any.
pub fn requested_item_count(question: &str) -> Option<usize> {
    if let Some(caps) = LIST_COUNT_RE.captures(question) {
        return parse_count(&caps[1]);
    }
    if let Some(caps) = COUNT_BEFORE_NOUN_RE.captures(question) {
        return parse_count(&caps[1]);
    }
    None
}

static ASPECT_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:,\s*(?:and\s+)?|\band\s+(?:also\s+)?|\bas\s+well\s+as\s+|\bcompared\s+to\s+|\bversus\s+|\bvs\.?\s+)\s*").unwrap()
});

/// Decompose a question into the distinct aspects it asks about.
///
/// A single-aspect question returns one segment; conjunctions multiply
/// aspects.
pub fn decompose_aspects(question: &str) -> Vec<String> {
    let trimmed = question.trim().trim_end_matches(['?', '.', '!']);
    ASPECT_SPLIT_RE
        .split(trimmed)
        .map(str::trim)
        .filter(|s| s.split_whitespace().count() >= 2)
        .map(str::to_string)
        .collect()
}

static HEDGING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(might|may\s+be|maybe|possibly|probably|perhaps|unclear|not\s+sure|i\s+think|it\s+depends|could\s+be|uncertain|hard\s+to\s+say|seems?\s+like|allegedly)\b").unwrap()
});

/// Whether an answer contains hedging markers.
pub fn has_hedging(answer: &str) -> bool {
    HEDGING_RE.is_match(answer)
}

static RECENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(20\d{2}|current|currently|latest|recent|recently|today|right\s+now|this\s+(?:year|month|week)|up.to.date)\b").unwrap()
});

/// Whether a question asks about time-sensitive information.
pub fn mentions_recency(question: &str) -> bool {
    RECENCY_RE.is_match(question)
}

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(20\d{2})-(\d{2})-(\d{2})\b|\b(20\d{2})\b").unwrap()
});

/// Years and ISO dates mentioned in an answer, oldest first.
pub fn mentioned_years(answer: &str) -> Vec<i32> {
    let mut years: Vec<i32> = DATE_RE
        .captures_iter(answer)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(4))
                .and_then(|m| m.as_str().parse().ok())
        })
        .collect();
    years.sort_unstable();
    years.dedup();
    years
}
