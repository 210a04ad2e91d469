//! The top-level research loop.
//!
//! Steps run strictly in sequence; the parallel work a step spawns
//! (persona expansion, searches, reads) completes before the next step
//! begins. The context is owned here; sub-tasks receive clone-shared
//! handles to the serialised tables and return values the loop merges.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::reader::RetryingReader;
use crate::adapters::search::RetryingSearch;
use crate::budget::{BudgetTracker, UsageRecord};
use crate::classify::classify_topic;
use crate::config::SessionConfig;
use crate::contracts::llm::{LlmClient, LlmDecision};
use crate::contracts::reader::ReaderClient;
use crate::contracts::search::{SearchClient, SerpQuery};
use crate::dedup::QueryDedupGate;
use crate::contracts::embedding::EmbeddingClient;
use crate::contracts::sandbox::Sandbox;
use crate::error::{Error, Result};
use crate::evaluate::pipeline::EvaluatorPipeline;
use crate::evaluate::required::RequiredEvaluationResolver;
use crate::evaluate::types::EvalContext;
use crate::events::{AgentEvent, EventBus, PersonaActivity};
use crate::knowledge::store::{KnowledgeBase, UrlStore};
use crate::knowledge::types::{KnowledgeItem, Reference, ScoreInputs};
use crate::persona::expand::PersonaOrchestrator;
use crate::persona::registry::PersonaRegistry;
use crate::persona::types::{Clock, ExpandContext, SystemClock, WeightedQuery};
use crate::session::{BatchRecord, PersonaStats, SessionRecord, TaskRecord};
use crate::trace::{SearchTrace, TraceLog};

use super::actions::{ActionPermissions, AgentAction};
use super::context::{AgentContext, Question};
use super::permissions::{compute_permissions, MAX_URLS_PER_STEP};
use super::prompt::{build_action_prompt, build_beast_prompt, build_strict_reprompt};
use super::state::AgentState;

/// Budget fraction at which processing gives way to beast mode.
const BEAST_BUDGET_FRACTION: f64 = 0.85;

/// Terminal result of a run plus its session record.
#[derive(Debug)]
pub struct SessionOutcome {
    pub state: AgentState,
    pub record: SessionRecord,
}

enum StepOutcome {
    Continue,
    ErrorStep(String),
    Beast(String),
    Done(AgentState),
}

/// The agent state machine.
pub struct ResearchAgent {
    config: SessionConfig,
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchClient>,
    reader: Arc<dyn ReaderClient>,
    personas: PersonaOrchestrator,
    dedup: QueryDedupGate,
    sandbox: Option<Arc<dyn Sandbox>>,
    resolver: RequiredEvaluationResolver,
    bus: EventBus,
    trace: TraceLog,
    clock: Arc<dyn Clock>,
}

impl ResearchAgent {
    /// Build an agent over the external contracts.
    ///
    /// Search and read calls are wrapped with the session retry policy;
    /// pass pre-wrapped adapters only if you want a different one.
    pub fn new(
        config: SessionConfig,
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        reader: Arc<dyn ReaderClient>,
        embedder: Arc<dyn EmbeddingClient>,
    ) -> Self {
        let bus = EventBus::new();
        let retry = config.retry.clone();
        let dedup = QueryDedupGate::new(embedder)
            .with_threshold(config.dedup_threshold)
            .with_bus(bus.clone());
        Self {
            search: Arc::new(RetryingSearch::new(search).with_config(retry.clone())),
            reader: Arc::new(RetryingReader::new(reader).with_config(retry)),
            personas: PersonaOrchestrator::new(PersonaRegistry::default()),
            dedup,
            sandbox: None,
            resolver: RequiredEvaluationResolver::new(),
            trace: TraceLog::new(),
            clock: Arc::new(SystemClock),
            config,
            llm,
            bus,
        }
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn with_personas(mut self, personas: PersonaOrchestrator) -> Self {
        self.personas = personas;
        self
    }

    pub fn with_resolver(mut self, resolver: RequiredEvaluationResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The event bus observers subscribe to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The trace log for evidence reports.
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Run a research session to a terminal state.
    pub async fn run(&self, question: &str) -> Result<SessionOutcome> {
        self.run_with_stores(question, UrlStore::new().with_bus(self.bus.clone()), KnowledgeBase::new())
            .await
    }

    /// Run with pre-seeded stores.
    pub async fn run_with_stores(
        &self,
        question: &str,
        urls: UrlStore,
        knowledge: KnowledgeBase,
    ) -> Result<SessionOutcome> {
        if question.trim().is_empty() {
            return Err(Error::fatal("question must be non-empty"));
        }

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + global_deadline(self.config.token_budget);
        let tracker = BudgetTracker::new(self.config.token_budget).with_bus(self.bus.clone());
        let mut ctx = AgentContext::new(question, tracker).with_stores(urls, knowledge);
        let mut record = SessionRecord::begin(question);
        record.log("info", format!("session started: {question}"));

        let pipeline = EvaluatorPipeline::new(
            EvalContext::new(self.llm.clone())
                .with_clock(self.clock.clone())
                .with_tracker(ctx.tracker.clone()),
        )
        .with_trace(self.trace.clone());

        let state = loop {
            // Dropping a timed-out step future cancels its in-flight
            // calls; their partial outputs are discarded.
            let timed = tokio::time::timeout_at(
                deadline,
                self.run_step(&mut ctx, &mut record, &pipeline),
            )
            .await;
            let step = match timed {
                Ok(step) => step?,
                Err(_) => {
                    record.log("warning", "global deadline reached");
                    self.bus.warning("global deadline reached, forcing an answer");
                    break self.run_beast_mode(&mut ctx, &mut record, "deadline reached").await;
                }
            };

            match step {
                StepOutcome::Continue => {
                    if ctx.budget_used() >= BEAST_BUDGET_FRACTION {
                        break self
                            .run_beast_mode(&mut ctx, &mut record, "token budget nearly exhausted")
                            .await;
                    }
                }
                StepOutcome::ErrorStep(message) => {
                    record.log("error", &message);
                    ctx.add_diary("error", &message);
                    self.bus.error(message);
                    if ctx.budget_used() >= BEAST_BUDGET_FRACTION {
                        break self
                            .run_beast_mode(&mut ctx, &mut record, "token budget nearly exhausted")
                            .await;
                    }
                }
                StepOutcome::Beast(reason) => {
                    break self.run_beast_mode(&mut ctx, &mut record, &reason).await;
                }
                StepOutcome::Done(state) => break state,
            }
        };

        self.finish_record(&ctx, &mut record, &state, started);
        Ok(SessionOutcome { state, record })
    }

    async fn run_step(
        &self,
        ctx: &mut AgentContext,
        record: &mut SessionRecord,
        pipeline: &EvaluatorPipeline,
    ) -> Result<StepOutcome> {
        ctx.total_step += 1;
        ctx.gap_questions_this_step = 0;
        self.bus.emit(AgentEvent::StepChanged(ctx.total_step));

        ctx.rotate_question();
        let permissions = compute_permissions(ctx, &self.config);

        let decision = match self.obtain_action(ctx, &permissions).await? {
            Ok(decision) => decision,
            Err(outcome) => return Ok(outcome),
        };

        if let Some(thinking) = &decision.thinking {
            self.bus.emit(AgentEvent::Think(thinking.clone()));
        }
        let kind = decision.action.kind();
        self.bus.emit(AgentEvent::ActionChosen(kind.to_string()));
        record.log("info", format!("step {}: {kind}", ctx.total_step));

        let outcome = match decision.action {
            AgentAction::Search { queries } => self.execute_search(ctx, record, queries).await,
            AgentAction::Read { urls } => self.execute_read(ctx, record, urls).await,
            AgentAction::Reflect { gap_questions } => {
                self.execute_reflect(ctx, gap_questions)
            }
            AgentAction::Answer { answer, references } => {
                self.execute_answer(ctx, record, pipeline, answer, references)
                    .await
            }
            AgentAction::Coding { code } => self.execute_coding(ctx, record, code).await,
        };

        match outcome {
            Ok(StepOutcome::Continue) => {
                ctx.step += 1;
                Ok(StepOutcome::Continue)
            }
            Ok(other) => Ok(other),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(StepOutcome::ErrorStep(format!("{kind} failed: {e}"))),
        }
    }

    /// Ask the LLM for an action, allowing one stricter re-prompt after a
    /// contract violation. A second violation in the same step escalates
    /// to beast mode.
    async fn obtain_action(
        &self,
        ctx: &AgentContext,
        permissions: &ActionPermissions,
    ) -> Result<std::result::Result<LlmDecision, StepOutcome>> {
        let mut violation: Option<String> = None;

        loop {
            let request = match &violation {
                None => build_action_prompt(ctx, permissions),
                Some(v) => build_strict_reprompt(ctx, permissions, v),
            };

            let failure = match self.llm.decide_action(request, permissions).await {
                Ok(decision) => {
                    ctx.tracker.record(decision.usage.clone());
                    if permissions.allows(decision.action.kind()) {
                        return Ok(Ok(decision));
                    }
                    format!("chose disallowed action {}", decision.action.kind())
                }
                Err(Error::ContractViolation(v)) => v,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    return Ok(Err(StepOutcome::ErrorStep(format!(
                        "action decision failed: {e}"
                    ))))
                }
            };

            if violation.is_some() {
                warn!(violation = %failure, "second contract violation in one step");
                return Ok(Err(StepOutcome::Beast(format!(
                    "repeated contract violation: {failure}"
                ))));
            }
            warn!(violation = %failure, "contract violation, re-prompting strictly");
            violation = Some(failure);
        }
    }

    async fn execute_search(
        &self,
        ctx: &mut AgentContext,
        record: &mut SessionRecord,
        queries: Vec<SerpQuery>,
    ) -> Result<StepOutcome> {
        if queries.is_empty() {
            return Err(Error::contract("search action carried no queries"));
        }
        let search_started = Instant::now();

        let expand_ctx = ExpandContext::for_topic(classify_topic(&ctx.original_question.text))
            .with_clock(self.clock.clone());
        let expansion = self.personas.expand_batch(&queries, &expand_ctx);
        for metric in &expansion.metrics {
            let entry = record
                .personas
                .entry(metric.persona_name.clone())
                .or_insert_with(PersonaStats::default);
            entry.expansions += 1;
        }
        self.trace.record_personas(expansion.metrics);

        let deduped = self.dedup.filter(expansion.queries, ctx.executed_queries()).await;
        if deduped.accepted.is_empty() {
            ctx.add_diary("search", "all expanded queries were near-duplicates");
            record.log("info", "search skipped: all queries deduplicated");
            return Ok(StepOutcome::Continue);
        }

        let label = format!("search#{}", ctx.total_step);
        self.bus.emit(AgentEvent::BatchStart {
            label: label.clone(),
            size: deduped.accepted.len(),
        });

        let searches = deduped.accepted.iter().enumerate().map(|(index, wq)| {
            let search = self.search.clone();
            let query = wq.query.clone();
            async move {
                let request_ts = Utc::now();
                let started = Instant::now();
                let result = search.search(&query).await;
                (index, request_ts, started.elapsed(), result)
            }
        });
        let results = join_all(searches).await;

        let mut new_urls = 0usize;
        let mut succeeded = 0usize;
        let mut last_error: Option<Error> = None;
        for (index, request_ts, elapsed, result) in results {
            let wq: &WeightedQuery = &deduped.accepted[index];
            let ok = result.is_ok();
            self.bus.emit(AgentEvent::BatchTask {
                label: label.clone(),
                index,
                ok,
            });
            record.all_tasks.push(TaskRecord {
                label: format!("{label}[{index}] {}", wq.query.q),
                ok,
                duration_ms: elapsed.as_millis() as u64,
            });

            match result {
                Ok(search_result) => {
                    succeeded += 1;
                    let bytes: u64 = search_result
                        .snippets
                        .iter()
                        .map(|s| s.excerpt.len() as u64)
                        .sum();
                    // Rough snippet token estimate, scaled by the
                    // configured factor (kept at 1).
                    let est_tokens =
                        ((bytes as f64 / 4.0) * self.config.search_token_scaler).round() as u64;
                    ctx.tracker.record(UsageRecord::new("search", est_tokens, 0));
                    let mut extracted = 0usize;
                    for snippet in &search_result.snippets {
                        let inputs = ScoreInputs {
                            query_weight: wq.weight,
                            hostname_boost: hostname_boost(&snippet.url),
                            path_boost: path_boost(&snippet.url),
                            rerank: None,
                        };
                        match ctx
                            .urls
                            .add(&snippet.url, Some(snippet.title.as_str()), inputs, ctx.total_step)
                        {
                            Ok(canonical) => {
                                extracted += 1;
                                new_urls += 1;
                                ctx.knowledge.push(KnowledgeItem::SideInfo {
                                    question: wq.query.q.clone(),
                                    answer: snippet.excerpt.clone(),
                                    source_url: canonical,
                                });
                            }
                            Err(e) if e.is_fatal() => return Err(e),
                            Err(_) => {} // unparseable URL in upstream response
                        }
                    }
                    if let Some(stats) = record.personas.get_mut(&wq.source_persona) {
                        stats.searches += 1;
                        self.bus.emit(AgentEvent::PersonaStats(PersonaActivity {
                            name: wq.source_persona.clone(),
                            searches: stats.searches,
                            reads: 0,
                            answers: 0,
                            tokens: stats.tokens,
                            active: true,
                        }));
                    }
                    self.trace.record_search(SearchTrace {
                        trace_id: Uuid::new_v4(),
                        origin: wq.source_persona.clone(),
                        query: wq.query.q.clone(),
                        api: "search".into(),
                        request_ts,
                        response_ts: Utc::now(),
                        results_count: search_result.snippets.len(),
                        bytes,
                        urls_extracted: extracted,
                    });
                }
                Err(e) => {
                    warn!(query = %wq.query.q, error = %e, "search failed");
                    last_error = Some(e);
                }
            }
        }
        self.bus.emit(AgentEvent::BatchEnd { label: label.clone() });
        record.parallel_batches.push(BatchRecord {
            label,
            size: deduped.accepted.len(),
            succeeded,
        });
        record.timing.search_ms += search_started.elapsed().as_millis() as u64;

        if succeeded == 0 {
            return Err(last_error.unwrap_or_else(|| Error::transient("search", "no results")));
        }

        ctx.record_executed_queries(deduped.accepted.into_iter().map(|wq| wq.query));
        ctx.add_diary(
            "search",
            format!("ran {succeeded} quer{} and found {new_urls} new urls",
                if succeeded == 1 { "y" } else { "ies" }),
        );
        Ok(StepOutcome::Continue)
    }

    async fn execute_read(
        &self,
        ctx: &mut AgentContext,
        record: &mut SessionRecord,
        requested: Vec<String>,
    ) -> Result<StepOutcome> {
        let read_started = Instant::now();

        // Honor the LLM's picks where they are known and unvisited, then
        // top up by score; ties go to earlier discovery.
        let mut targets: Vec<String> = Vec::new();
        for raw in &requested {
            if targets.len() >= MAX_URLS_PER_STEP {
                break;
            }
            let Ok(canonical) = crate::knowledge::canonical::canonicalize(raw) else {
                continue;
            };
            if let Some(rec) = ctx.urls.get(&canonical) {
                if !rec.visited && !targets.contains(&canonical) {
                    targets.push(canonical);
                }
            }
        }
        for rec in ctx.urls.top_unvisited(MAX_URLS_PER_STEP) {
            if targets.len() >= MAX_URLS_PER_STEP {
                break;
            }
            if !targets.contains(&rec.url) {
                targets.push(rec.url);
            }
        }
        if targets.is_empty() {
            return Err(Error::contract("read action with no unvisited urls"));
        }

        let label = format!("read#{}", ctx.total_step);
        self.bus.emit(AgentEvent::BatchStart {
            label: label.clone(),
            size: targets.len(),
        });

        let reads = targets.iter().enumerate().map(|(index, url)| {
            let reader = self.reader.clone();
            let url = url.clone();
            async move {
                let started = Instant::now();
                let result = reader.read(&url).await;
                (index, started.elapsed(), result)
            }
        });
        let results = join_all(reads).await;

        let mut read_count = 0usize;
        let mut last_error: Option<Error> = None;
        for (index, elapsed, result) in results {
            let url = &targets[index];
            let ok = result.is_ok();
            self.bus.emit(AgentEvent::BatchTask {
                label: label.clone(),
                index,
                ok,
            });
            record.all_tasks.push(TaskRecord {
                label: format!("{label}[{index}] {url}"),
                ok,
                duration_ms: elapsed.as_millis() as u64,
            });

            match result {
                Ok(read_result) => {
                    read_count += 1;
                    // Side-effects land before the diary entry: mark
                    // visited, then record the excerpt.
                    ctx.urls.mark_visited(url);
                    ctx.knowledge.push(KnowledgeItem::SideInfo {
                        question: ctx.current_question.text.clone(),
                        answer: excerpt_of(&read_result.text),
                        source_url: url.clone(),
                    });
                }
                Err(e) => {
                    // Failed reads stay unvisited and eligible for retry
                    // on a later step.
                    warn!(url = %url, error = %e, "read failed");
                    last_error = Some(e);
                }
            }
        }
        self.bus.emit(AgentEvent::BatchEnd { label: label.clone() });
        record.parallel_batches.push(BatchRecord {
            label,
            size: targets.len(),
            succeeded: read_count,
        });
        record.timing.read_ms += read_started.elapsed().as_millis() as u64;

        if read_count == 0 {
            return Err(last_error.unwrap_or_else(|| Error::transient("reader", "no reads")));
        }

        ctx.add_diary(
            "read",
            format!("read {read_count} of {} urls", targets.len()),
        );
        Ok(StepOutcome::Continue)
    }

    fn execute_reflect(
        &self,
        ctx: &mut AgentContext,
        gap_questions: Vec<String>,
    ) -> Result<StepOutcome> {
        let mut accepted = 0usize;
        for question in gap_questions
            .iter()
            .take(super::permissions::MAX_REFLECT_PER_STEP)
        {
            if ctx.enqueue_gap_question(question) {
                accepted += 1;
            }
        }

        if accepted == 0 {
            info!("reflection produced no new questions");
            ctx.add_diary("reflect", "no new questions (all duplicates)");
        } else {
            ctx.add_diary("reflect", format!("added {accepted} gap questions"));
        }
        Ok(StepOutcome::Continue)
    }

    async fn execute_answer(
        &self,
        ctx: &mut AgentContext,
        record: &mut SessionRecord,
        pipeline: &EvaluatorPipeline,
        answer: String,
        references: Vec<Reference>,
    ) -> Result<StepOutcome> {
        // A first-step answer in direct mode completes trivially without
        // evaluation.
        if ctx.total_step == 1 && self.config.allow_direct_answer {
            self.bus.emit(AgentEvent::Complete {
                answer: answer.clone(),
                trivial: true,
            });
            return Ok(StepOutcome::Done(AgentState::Completed {
                answer,
                references: Vec::new(),
                trivial: true,
            }));
        }

        let llm_started = Instant::now();
        let question = ctx.current_question.clone();
        let required = self
            .resolver
            .resolve(&question.text, question.is_original())
            .await;
        let outcome = pipeline
            .evaluate_sequential(&question.text, &answer, &required)
            .await?;
        record.timing.llm_ms += llm_started.elapsed().as_millis() as u64;

        if !outcome.passed {
            let failure = outcome.failure().expect("failed outcome has a failure");
            let item = outcome
                .to_error_knowledge(&question.text, &answer)
                .expect("failed outcome converts");
            ctx.knowledge.push(item);
            ctx.add_diary(
                "answer",
                format!("rejected: failed {} ({})", failure.eval_type, failure.reasoning),
            );
            record.log(
                "warning",
                format!("answer rejected by {} evaluator", failure.eval_type),
            );
            return Ok(StepOutcome::Continue);
        }

        let references = self.resolve_references(ctx, &answer, references);
        self.bus.emit(AgentEvent::Complete {
            answer: answer.clone(),
            trivial: false,
        });
        Ok(StepOutcome::Done(AgentState::Completed {
            answer,
            references,
            trivial: false,
        }))
    }

    async fn execute_coding(
        &self,
        ctx: &mut AgentContext,
        record: &mut SessionRecord,
        code: String,
    ) -> Result<StepOutcome> {
        let Some(sandbox) = &self.sandbox else {
            return Err(Error::permanent("sandbox", "no sandbox configured"));
        };
        let result = sandbox.execute(&code).await?;
        let output = if result.succeeded() {
            result.stdout
        } else {
            format!("exit {}: {}", result.exit_code, result.stderr)
        };
        ctx.knowledge.push(KnowledgeItem::SideInfo {
            question: ctx.current_question.text.clone(),
            answer: output,
            source_url: format!("sandbox://step-{}", ctx.total_step),
        });
        ctx.add_diary("coding", format!("executed {} bytes of code", code.len()));
        record.log("info", "sandbox execution recorded");
        Ok(StepOutcome::Continue)
    }

    /// Keep supplied references that name visited URLs; fall back to
    /// overlap extraction from knowledge when none survive.
    fn resolve_references(
        &self,
        ctx: &AgentContext,
        answer: &str,
        supplied: Vec<Reference>,
    ) -> Vec<Reference> {
        let mut valid: Vec<Reference> = Vec::new();
        for mut reference in supplied {
            let Ok(canonical) = crate::knowledge::canonical::canonicalize(&reference.source_url)
            else {
                continue;
            };
            match ctx.urls.get(&canonical) {
                Some(record) if record.visited => {
                    reference.source_url = canonical;
                    if reference.title.is_none() {
                        reference.title = record.title;
                    }
                    if !valid.iter().any(|r: &Reference| r.source_url == reference.source_url) {
                        valid.push(reference);
                    }
                }
                _ => {}
            }
        }
        if valid.is_empty() {
            valid = ctx.knowledge.extract_references(answer, &ctx.urls);
        }
        valid
    }

    async fn run_beast_mode(
        &self,
        ctx: &mut AgentContext,
        record: &mut SessionRecord,
        reason: &str,
    ) -> AgentState {
        // The step counter resets on this transition; total_step keeps
        // counting attempts. The rotation queue is abandoned: beast mode
        // works against a forced restatement of the original question.
        ctx.step = 0;
        ctx.current_question = Question::beast_rewrite(ctx.original_question.text.clone());
        record.log("warning", format!("entering beast mode: {reason}"));
        self.bus
            .warning(format!("entering beast mode: {reason}"));

        let mut attempts = 0u32;
        let mut last_failure: Option<String> = None;

        while attempts < self.config.max_beast_attempts {
            attempts += 1;
            ctx.total_step += 1;
            let request = build_beast_prompt(ctx, self.config.beast_temperature);

            match self
                .llm
                .decide_action(request, &ActionPermissions::answer_only())
                .await
            {
                Ok(decision) => {
                    ctx.tracker.record(decision.usage.clone());
                    match decision.action {
                        AgentAction::Answer { answer, references } if !answer.trim().is_empty() => {
                            let references = self.resolve_references(ctx, &answer, references);
                            record.log("info", format!("beast mode answered on attempt {attempts}"));
                            self.bus.emit(AgentEvent::Complete {
                                answer: answer.clone(),
                                trivial: false,
                            });
                            return AgentState::Completed {
                                answer,
                                references,
                                trivial: false,
                            };
                        }
                        AgentAction::Answer { .. } => {
                            last_failure = Some("forced answer was empty".into());
                        }
                        other => {
                            last_failure =
                                Some(format!("forced answer chose {} instead", other.kind()));
                        }
                    }
                }
                Err(e) => {
                    last_failure = Some(e.to_string());
                }
            }
            warn!(attempt = attempts, failure = ?last_failure, "beast attempt failed");
        }

        let reason = format!(
            "beast mode exhausted after {attempts} attempts: {}",
            last_failure.unwrap_or_else(|| "no failure detail".into())
        );
        record.log("error", &reason);
        self.bus.error(reason.clone());
        AgentState::Failed {
            reason,
            partial_knowledge: ctx.knowledge.snapshot(),
        }
    }

    fn finish_record(
        &self,
        ctx: &AgentContext,
        record: &mut SessionRecord,
        state: &AgentState,
        started: Instant,
    ) {
        record.finished_at = Utc::now();
        record.timing.total_ms = started.elapsed().as_millis() as u64;
        record.visited_urls = ctx
            .urls
            .filter(|r| r.visited)
            .into_iter()
            .map(|r| r.url)
            .collect();
        record.stats.steps = ctx.total_step;
        record.stats.urls_found = ctx.urls.count();
        record.stats.tokens_used = ctx.tracker.total_tokens();

        // Persona token attribution: an even share of session usage.
        let total_tokens = ctx.tracker.total_tokens();
        let persona_count = record.personas.len().max(1) as u64;
        for stats in record.personas.values_mut() {
            stats.tokens = total_tokens / persona_count;
        }

        match state {
            AgentState::Completed {
                answer, references, ..
            } => {
                record.success = true;
                record.answer = Some(answer.clone());
                record.references = references
                    .iter()
                    .map(|r| SessionRecord::reference_line(r.title.as_deref(), &r.source_url))
                    .collect();
                record.log("info", "session completed");
                self.bus.success("session completed");
            }
            AgentState::Failed { reason, .. } => {
                record.success = false;
                record.error = Some(reason.clone());
            }
            _ => {}
        }
    }
}

fn global_deadline(token_budget: u64) -> Duration {
    // Heuristic: a tenth of a second of wall clock per thousand budget
    // tokens, clamped to [60s, 1h].
    let secs = (token_budget / 10_000).clamp(60, 3_600);
    Duration::from_secs(secs)
}

fn hostname_boost(url: &str) -> f64 {
    let host = crate::knowledge::canonical::hostname(url).unwrap_or_default();
    if host.ends_with("wikipedia.org") || host.starts_with("docs.") {
        1.3
    } else if host.ends_with("github.com") || host.ends_with(".gov") || host.ends_with(".edu") {
        1.2
    } else {
        1.0
    }
}

fn path_boost(url: &str) -> f64 {
    if url.contains("/docs/") || url.contains("/documentation/") || url.contains("/reference/") {
        1.2
    } else {
        1.0
    }
}

fn excerpt_of(text: &str) -> String {
    const MAX_EXCERPT: usize = 1_500;
    if text.len() <= MAX_EXCERPT {
        return text.to_string();
    }
    let mut end = MAX_EXCERPT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
