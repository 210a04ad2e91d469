//! The deduplicating URL store and the ordered knowledge list.
//!
//! Both are shared-mutable tables whose writes serialise through a mutex.
//! Locks are never held across a suspension point; parallel sub-tasks read
//! snapshots and the agent loop merges results back at step boundaries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::events::{AgentEvent, EventBus};

use super::canonical::{canonicalize, hostname};
use super::types::{KnowledgeItem, Reference, ScoreInputs, UrlRecord};

/// Word-overlap ratio above which an answer sentence cites a knowledge item.
const REFERENCE_OVERLAP_THRESHOLD: f64 = 0.5;

#[derive(Debug)]
struct UrlEntry {
    record: UrlRecord,
    inputs: ScoreInputs,
    frequency: u64,
    /// Insertion index; breaks score ties (earlier first).
    order: usize,
}

#[derive(Debug, Default)]
struct UrlStoreInner {
    entries: HashMap<String, UrlEntry>,
    next_order: usize,
}

/// Dedup set of URLs with deterministic scores.
///
/// URLs are unique by canonical form. Re-adding a known URL bumps its
/// frequency and keeps the strongest query weight seen.
#[derive(Clone, Default)]
pub struct UrlStore {
    inner: Arc<Mutex<UrlStoreInner>>,
    bus: Option<EventBus>,
}

impl UrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an event bus; UrlCounts events are emitted on changes.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Add a URL observation. Returns the canonical form.
    ///
    /// Fails on URLs that cannot be canonicalized; a negative resulting
    /// score is an invariant violation and is fatal.
    pub fn add(
        &self,
        raw_url: &str,
        title: Option<&str>,
        inputs: ScoreInputs,
        step: u32,
    ) -> Result<String> {
        let canonical = canonicalize(raw_url)?;
        let host = hostname(&canonical).unwrap_or_default();

        let mut inner = self.inner.lock().expect("url store poisoned");
        if !inner.entries.contains_key(&canonical) {
            let order = inner.next_order;
            inner.next_order += 1;
            inner.entries.insert(
                canonical.clone(),
                UrlEntry {
                    record: UrlRecord {
                        url: canonical.clone(),
                        hostname: host,
                        title: None,
                        score: 0.0,
                        visited: false,
                        discovered_at: step,
                    },
                    inputs,
                    frequency: 0,
                    order,
                },
            );
        }
        let entry = inner
            .entries
            .get_mut(&canonical)
            .expect("entry just inserted");

        entry.frequency += 1;
        entry.inputs.query_weight = entry.inputs.query_weight.max(inputs.query_weight);
        entry.inputs.hostname_boost = entry.inputs.hostname_boost.max(inputs.hostname_boost);
        entry.inputs.path_boost = entry.inputs.path_boost.max(inputs.path_boost);
        if inputs.rerank.is_some() {
            entry.inputs.rerank = inputs.rerank;
        }
        if entry.record.title.is_none() {
            entry.record.title = title.map(str::to_string);
        }
        entry.record.score = entry.inputs.score(entry.frequency);
        if entry.record.score < 0.0 {
            return Err(Error::fatal(format!(
                "negative score for {canonical}: {}",
                entry.record.score
            )));
        }

        let (total, visited) = counts_locked(&inner);
        drop(inner);
        self.emit_counts(total, visited);
        Ok(canonical)
    }

    /// Top-N unvisited records, highest score first, discovery order as the
    /// tie-break (earlier first).
    pub fn top_unvisited(&self, n: usize) -> Vec<UrlRecord> {
        let inner = self.inner.lock().expect("url store poisoned");
        let mut candidates: Vec<&UrlEntry> = inner
            .entries
            .values()
            .filter(|e| !e.record.visited)
            .collect();
        candidates.sort_by(|a, b| {
            b.record
                .score
                .partial_cmp(&a.record.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.order.cmp(&b.order))
        });
        candidates
            .into_iter()
            .take(n)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Flip a record's visited flag. One-way: never unset.
    ///
    /// Returns false if the URL is unknown.
    pub fn mark_visited(&self, canonical_url: &str) -> bool {
        let mut inner = self.inner.lock().expect("url store poisoned");
        let known = match inner.entries.get_mut(canonical_url) {
            Some(entry) => {
                entry.record.visited = true;
                true
            }
            None => false,
        };
        let (total, visited) = counts_locked(&inner);
        drop(inner);
        if known {
            self.emit_counts(total, visited);
            if let Some(bus) = &self.bus {
                bus.emit(AgentEvent::VisitedUrl(canonical_url.to_string()));
            }
        }
        known
    }

    /// Total number of known URLs.
    pub fn count(&self) -> usize {
        self.inner.lock().expect("url store poisoned").entries.len()
    }

    /// Number of visited URLs.
    pub fn visited_count(&self) -> usize {
        self.inner
            .lock()
            .expect("url store poisoned")
            .entries
            .values()
            .filter(|e| e.record.visited)
            .count()
    }

    /// Whether any record remains unvisited.
    pub fn has_unvisited(&self) -> bool {
        self.inner
            .lock()
            .expect("url store poisoned")
            .entries
            .values()
            .any(|e| !e.record.visited)
    }

    /// Look up a record by canonical URL.
    pub fn get(&self, canonical_url: &str) -> Option<UrlRecord> {
        self.inner
            .lock()
            .expect("url store poisoned")
            .entries
            .get(canonical_url)
            .map(|e| e.record.clone())
    }

    /// Records matching a predicate, in discovery order.
    pub fn filter(&self, pred: impl Fn(&UrlRecord) -> bool) -> Vec<UrlRecord> {
        let inner = self.inner.lock().expect("url store poisoned");
        let mut matched: Vec<&UrlEntry> =
            inner.entries.values().filter(|e| pred(&e.record)).collect();
        matched.sort_by_key(|e| e.order);
        matched.into_iter().map(|e| e.record.clone()).collect()
    }

    fn emit_counts(&self, total: usize, visited: usize) {
        if let Some(bus) = &self.bus {
            bus.emit(AgentEvent::UrlCounts { total, visited });
        }
    }
}

fn counts_locked(inner: &UrlStoreInner) -> (usize, usize) {
    let visited = inner.entries.values().filter(|e| e.record.visited).count();
    (inner.entries.len(), visited)
}

impl std::fmt::Debug for UrlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlStore")
            .field("count", &self.count())
            .field("visited", &self.visited_count())
            .finish()
    }
}

/// Append-only, insertion-ordered knowledge list.
#[derive(Clone, Default)]
pub struct KnowledgeBase {
    items: Arc<Mutex<Vec<KnowledgeItem>>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. Items are never mutated after insertion.
    pub fn push(&self, item: KnowledgeItem) {
        self.items.lock().expect("knowledge poisoned").push(item);
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("knowledge poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all items in insertion order.
    pub fn snapshot(&self) -> Vec<KnowledgeItem> {
        self.items.lock().expect("knowledge poisoned").clone()
    }

    /// Stable textual rendering for the LLM prompt, oldest first.
    pub fn format_for_prompt(&self) -> String {
        let items = self.items.lock().expect("knowledge poisoned");
        let mut out = String::new();
        for (i, item) in items.iter().enumerate() {
            match item {
                KnowledgeItem::Qa {
                    question,
                    answer,
                    references,
                } => {
                    out.push_str(&format!("[{}] Q: {question}\nA: {answer}\n", i + 1));
                    for r in references {
                        out.push_str(&format!("  ref: {}\n", r.source_url));
                    }
                }
                KnowledgeItem::SideInfo {
                    question,
                    answer,
                    source_url,
                } => {
                    out.push_str(&format!(
                        "[{}] note ({source_url}) re {question}: {answer}\n",
                        i + 1
                    ));
                }
                KnowledgeItem::Error {
                    question,
                    failed_eval,
                    reason,
                    suggestions,
                    ..
                } => {
                    out.push_str(&format!(
                        "[{}] rejected answer for {question}: failed {failed_eval} ({reason})\n",
                        i + 1
                    ));
                    for s in suggestions {
                        out.push_str(&format!("  fix: {s}\n"));
                    }
                }
            }
        }
        out
    }

    /// Extract references from an answer by sentence-level word overlap
    /// against knowledge items that carry a source URL.
    ///
    /// Only URLs that exist in the store with `visited = true` yield
    /// references. At most one reference per source URL.
    pub fn extract_references(&self, answer: &str, urls: &UrlStore) -> Vec<Reference> {
        let items = self.items.lock().expect("knowledge poisoned");
        let sourced: Vec<(&str, Vec<String>)> = items
            .iter()
            .filter_map(|item| {
                item.source_url().map(|url| {
                    let mut tokens = tokenize(item.question());
                    if let KnowledgeItem::SideInfo { answer, .. } = item {
                        tokens.extend(tokenize(answer));
                    }
                    (url, tokens)
                })
            })
            .collect();

        let mut refs: Vec<Reference> = Vec::new();
        for sentence in split_sentences(answer) {
            let sentence_tokens = tokenize(&sentence);
            if sentence_tokens.is_empty() {
                continue;
            }
            for (url, item_tokens) in &sourced {
                if refs.iter().any(|r| r.source_url == *url) {
                    continue;
                }
                if jaccard(&sentence_tokens, item_tokens) < REFERENCE_OVERLAP_THRESHOLD {
                    continue;
                }
                let Some(record) = urls.get(url) else { continue };
                if !record.visited {
                    continue;
                }
                refs.push(Reference {
                    excerpt: sentence.clone(),
                    source_url: url.to_string(),
                    title: record.title,
                });
            }
        }
        refs
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase").field("len", &self.len()).finish()
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    use std::collections::HashSet;
    let sa: HashSet<&String> = a.iter().collect();
    let sb: HashSet<&String> = b.iter().collect();
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count() as f64;
    // Overlap relative to the smaller set; an answer sentence citing a
    // long excerpt should still match.
    inter / sa.len().min(sb.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(store: &UrlStore, url: &str, weight: f64, step: u32) -> String {
        store
            .add(
                url,
                None,
                ScoreInputs {
                    query_weight: weight,
                    ..ScoreInputs::default()
                },
                step,
            )
            .unwrap()
    }

    #[test]
    fn test_unique_by_canonical_form() {
        let store = UrlStore::new();
        add(&store, "https://Example.com/a#frag", 1.0, 0);
        add(&store, "https://example.com:443/a", 1.0, 1);
        assert_eq!(store.count(), 1);
        let record = store.get("https://example.com/a").unwrap();
        // Re-adding bumps frequency, which raises the score.
        assert_eq!(record.score, 2.0);
        assert_eq!(record.discovered_at, 0);
    }

    #[test]
    fn test_top_unvisited_score_then_discovery_order() {
        let store = UrlStore::new();
        add(&store, "https://a.com/", 1.0, 0);
        add(&store, "https://b.com/", 2.0, 0);
        add(&store, "https://c.com/", 1.0, 1);

        let top = store.top_unvisited(3);
        assert_eq!(top[0].url, "https://b.com/");
        // a and c tie at 1.0; a was discovered first.
        assert_eq!(top[1].url, "https://a.com/");
        assert_eq!(top[2].url, "https://c.com/");
    }

    #[test]
    fn test_mark_visited_one_way() {
        let store = UrlStore::new();
        let url = add(&store, "https://a.com/x", 1.0, 0);
        assert!(store.has_unvisited());
        assert!(store.mark_visited(&url));
        assert!(!store.has_unvisited());
        assert!(store.top_unvisited(5).is_empty());
        assert!(!store.mark_visited("https://unknown.com/"));
    }

    #[test]
    fn test_rerank_factor_applies() {
        let store = UrlStore::new();
        store
            .add(
                "https://a.com/",
                None,
                ScoreInputs {
                    query_weight: 1.0,
                    hostname_boost: 2.0,
                    path_boost: 1.5,
                    rerank: Some(0.5),
                },
                0,
            )
            .unwrap();
        let record = store.get("https://a.com/").unwrap();
        assert!((record.score - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_filter_in_discovery_order() {
        let store = UrlStore::new();
        add(&store, "https://a.com/", 1.0, 0);
        add(&store, "https://b.org/", 1.0, 0);
        add(&store, "https://c.com/", 1.0, 1);
        let coms = store.filter(|r| r.hostname.ends_with(".com"));
        assert_eq!(coms.len(), 2);
        assert_eq!(coms[0].url, "https://a.com/");
        assert_eq!(coms[1].url, "https://c.com/");
    }

    #[test]
    fn test_knowledge_insertion_order_preserved() {
        let kb = KnowledgeBase::new();
        kb.push(KnowledgeItem::SideInfo {
            question: "first".into(),
            answer: "a".into(),
            source_url: "https://a.com/".into(),
        });
        kb.push(KnowledgeItem::SideInfo {
            question: "second".into(),
            answer: "b".into(),
            source_url: "https://b.com/".into(),
        });
        let rendered = kb.format_for_prompt();
        let first = rendered.find("first").unwrap();
        let second = rendered.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_extract_references_requires_visited() {
        let store = UrlStore::new();
        let url = store
            .add(
                "https://db.example.com/list",
                Some("BSD databases"),
                ScoreInputs::default(),
                0,
            )
            .unwrap();

        let kb = KnowledgeBase::new();
        kb.push(KnowledgeItem::SideInfo {
            question: "open source BSD licensed databases".into(),
            answer: "PostgreSQL and Redis are BSD licensed databases".into(),
            source_url: url.clone(),
        });

        let answer = "PostgreSQL and Redis are popular BSD licensed databases.";
        // Unvisited: no references.
        assert!(kb.extract_references(answer, &store).is_empty());

        store.mark_visited(&url);
        let refs = kb.extract_references(answer, &store);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].source_url, url);
        assert_eq!(refs[0].title.as_deref(), Some("BSD databases"));
    }

    #[test]
    fn test_extract_references_one_per_url() {
        let store = UrlStore::new();
        let url = add(&store, "https://a.com/doc", 1.0, 0);
        store.mark_visited(&url);

        let kb = KnowledgeBase::new();
        kb.push(KnowledgeItem::SideInfo {
            question: "rust async runtimes comparison".into(),
            answer: "tokio dominates rust async runtimes today".into(),
            source_url: url.clone(),
        });

        let answer =
            "Tokio dominates rust async runtimes. Rust async runtimes comparison favors tokio.";
        let refs = kb.extract_references(answer, &store);
        assert_eq!(refs.len(), 1);
    }
}
