//! The analysis orchestrator.
//!
//! One attempt walks `Retrieving -> Conversing <-> ToolDispatch -> Parsing`
//! and ends in `Completed` or `Failed`. Every attempt that gets past the
//! duplicate guard owns exactly one `pending` row, and that row is finished
//! exactly once.

use crate::BosunError;
use crate::analyses::AnalysisRepository;
use crate::config::BosunConfig;
use crate::embed::Embedder;
use crate::error::{AnalysisError, EventError, ModelError, ToolError};
use crate::events::EventRepository;
use crate::locks::EventLocks;
use crate::model::{Conversation, ModelDriver, ModelTurn};
use crate::parse::parse_answer;
use crate::prompt::{FINAL_ANSWER_PROMPT, reference_message, user_message};
use crate::retriever::ContextRetriever;
use crate::store::{Store, StoreProvider, with_store};
use crate::tools::ToolRegistry;
use crate::types::{
    Analysis, AnalysisId, AnalysisOutcome, AnalysisStatus, Event, EventId, ToolCall, ToolResult,
    ToolSpec,
};
use crate::validation::{normalize_arguments, validate_arguments};
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, info_span, warn};

pub const INCOMPLETE_TEXT: &str =
    "Analysis incomplete: maximum tool rounds reached without a final answer.";
pub const ABANDONED_TEXT: &str = "Analysis abandoned: attempt did not finish in time.";
/// Store writes tried before a finished attempt gives up on persisting.
pub const FINISH_ATTEMPTS: u32 = 3;

/// Tunables read once from [`BosunConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub max_rounds: u32,
    pub max_failures: u32,
    pub tool_timeout: Duration,
    pub model_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub store_timeout: Duration,
    pub pending_stale_after: Duration,
}

impl AnalyzerSettings {
    pub fn from_config(config: &BosunConfig) -> Self {
        Self {
            max_rounds: config.tools.max_rounds,
            max_failures: config.tools.max_failures,
            tool_timeout: config.tools.call_timeout(),
            model_timeout: config.model.timeout(),
            max_retries: config.model.max_retries,
            retry_backoff: config.model.retry_backoff(),
            store_timeout: config.analysis.store_timeout(),
            pending_stale_after: config.analysis.pending_stale_after(),
        }
    }
}

#[derive(Debug)]
enum AttemptState {
    Retrieving,
    Conversing,
    ToolDispatch(Vec<ToolCall>),
    Parsing(String),
    Completed(AnalysisOutcome),
    Failed(String),
}

impl AttemptState {
    fn name(&self) -> &'static str {
        match self {
            Self::Retrieving => "retrieving",
            Self::Conversing => "conversing",
            Self::ToolDispatch(_) => "tool_dispatch",
            Self::Parsing(_) => "parsing",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

enum Claim {
    Existing(Analysis),
    Fresh { event: Event, pending: Analysis },
}

pub struct Analyzer<P: StoreProvider> {
    inner: Arc<Inner<P>>,
}

impl<P: StoreProvider> Clone for Analyzer<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<P: StoreProvider> {
    provider: P,
    retriever: ContextRetriever<P>,
    tools: Arc<dyn ToolRegistry>,
    model: Arc<dyn ModelDriver>,
    locks: EventLocks,
    settings: AnalyzerSettings,
    /// Pending rows this process could not finish. The next claim for the
    /// event closes them instead of returning them.
    orphans: Mutex<HashMap<EventId, AnalysisId>>,
}

impl<P: StoreProvider> Analyzer<P> {
    pub fn new(
        provider: P,
        embedder: Arc<dyn Embedder>,
        tools: Arc<dyn ToolRegistry>,
        model: Arc<dyn ModelDriver>,
        config: &BosunConfig,
    ) -> Self {
        let retriever = ContextRetriever::new(provider.clone(), embedder, config.retrieval.clone());
        Self {
            inner: Arc::new(Inner {
                provider,
                retriever,
                tools,
                model,
                locks: EventLocks::new(),
                settings: AnalyzerSettings::from_config(config),
                orphans: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.inner.settings
    }

    /// Returns the terminal analysis for `event_id`.
    ///
    /// Without `force`, an existing analysis is returned as is. The attempt runs
    /// on its own task, so dropping this future does not abandon it.
    pub async fn analyze(&self, event_id: EventId, force: bool) -> Result<Analysis, BosunError> {
        let inner = Arc::clone(&self.inner);
        let span = info_span!("analysis", event_id = %event_id, force);
        let handle = tokio::spawn(async move { inner.run(event_id, force).await }.instrument(span));
        handle.await.map_err(BosunError::internal)?
    }
}

impl<P: StoreProvider> Inner<P> {
    async fn run(&self, event_id: EventId, force: bool) -> Result<Analysis, BosunError> {
        let _lock = self.locks.acquire(event_id).await;

        let (event, pending) = match self.claim(event_id, force).await? {
            Claim::Existing(existing) => {
                info!(analysis_id = %existing.id, status = %existing.status, "returning existing analysis");
                return Ok(existing);
            }
            Claim::Fresh { event, pending } => (event, pending),
        };
        debug!(analysis_id = %pending.id, "claimed pending analysis");

        let outcome = self.attempt(&event).await;
        Ok(self.finish(pending, outcome).await)
    }

    /// Duplicate guard plus pending insert, serialized by one write transaction.
    async fn claim(&self, event_id: EventId, force: bool) -> Result<Claim, BosunError> {
        let model_used = self.model.model_used();
        let stale_after = TimeDelta::from_std(self.settings.pending_stale_after)
            .unwrap_or(TimeDelta::MAX);
        let orphan = self.orphans.lock().await.get(&event_id).copied();
        let claim = with_store(&self.provider, self.settings.store_timeout, move |store| {
            store.with_tx(|store| {
                let event = store
                    .events()
                    .get(event_id)?
                    .ok_or(EventError::NotFound)?;
                let now = Utc::now().trunc_subsecs(6);
                let mut latest = store.analyses().latest_for_event(event_id)?;

                if let Some(row) = latest.take() {
                    let abandoned = row.status == AnalysisStatus::Pending
                        && (orphan == Some(row.id)
                            || now.signed_duration_since(row.timestamp) > stale_after);
                    if abandoned {
                        warn!(analysis_id = %row.id, "finishing abandoned pending analysis");
                        let finished = store
                            .analyses()
                            .finish(row.id, &AnalysisOutcome::failed(ABANDONED_TEXT))?;
                        latest = Some(finished.unwrap_or(row));
                    } else if !force {
                        return Ok(Claim::Existing(row));
                    } else if row.status == AnalysisStatus::Pending {
                        return Err(AnalysisError::Conflict {
                            message: format!("analysis {} for event {event_id} is in progress", row.id),
                        }
                        .into());
                    } else {
                        latest = Some(row);
                    }
                }

                let at = next_timestamp(now, latest.as_ref().map(|row| row.timestamp));
                let pending = store.analyses().insert_pending(event_id, &model_used, at)?;
                Ok(Claim::Fresh { event, pending })
            })
        })
        .await?;
        if orphan.is_some() {
            self.orphans.lock().await.remove(&event_id);
        }
        Ok(claim)
    }

    /// Writes the terminal outcome, retrying with doubling delays. When every
    /// write fails the caller still gets a failed analysis, and the pending row
    /// is remembered so the next request for the event replaces it.
    async fn finish(&self, pending: Analysis, outcome: AnalysisOutcome) -> Analysis {
        let id = pending.id;
        let mut attempt = 0u32;
        let err = loop {
            match self.write_outcome(id, outcome.clone()).await {
                Ok(finished) => {
                    if finished.status == outcome.status {
                        info!(analysis_id = %finished.id, status = %finished.status, "analysis finished");
                    } else {
                        warn!(analysis_id = %finished.id, status = %finished.status, "analysis was finalized elsewhere");
                    }
                    return finished;
                }
                Err(err) if attempt + 1 < FINISH_ATTEMPTS => {
                    let delay = self
                        .settings
                        .retry_backoff
                        .saturating_mul(1u32 << attempt.min(16));
                    warn!(analysis_id = %id, error = %err, attempt, "storing analysis result failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => break err,
            }
        };

        error!(analysis_id = %id, error = %err, "analysis result could not be stored");
        self.orphans.lock().await.insert(pending.event_id, id);
        Analysis {
            analysis_text: format!("Analysis failed: result could not be stored: {err}"),
            suggested_actions: Vec::new(),
            confidence: None,
            status: AnalysisStatus::Failed,
            ..pending
        }
    }

    async fn write_outcome(
        &self,
        id: AnalysisId,
        outcome: AnalysisOutcome,
    ) -> Result<Analysis, BosunError> {
        with_store(&self.provider, self.settings.store_timeout, move |store| {
            match store.analyses().finish(id, &outcome)? {
                Some(row) => Ok(row),
                None => store
                    .analyses()
                    .get(id)?
                    .ok_or_else(|| AnalysisError::NotFound.into()),
            }
        })
        .await
    }

    async fn attempt(&self, event: &Event) -> AnalysisOutcome {
        let mut state = AttemptState::Retrieving;
        let mut conversation = Conversation::new();
        let mut tools: Vec<ToolSpec> = Vec::new();
        let mut rounds = 0u32;
        let mut failures = 0u32;
        let mut forced = false;

        loop {
            debug!(state = state.name(), rounds, failures, "analysis state");
            state = match state {
                AttemptState::Retrieving => {
                    let documents = self.retriever.retrieve_for(event).await;
                    conversation.push_user(user_message(event));
                    if let Some(reference) = reference_message(&documents) {
                        conversation.push_user(reference);
                    }
                    tools = self.list_tools().await;
                    AttemptState::Conversing
                }
                AttemptState::Conversing => {
                    let offered: &[ToolSpec] = if forced { &[] } else { &tools };
                    match self.converse(&conversation, offered).await {
                        Ok(ModelTurn::Final { text }) => AttemptState::Parsing(text),
                        Ok(ModelTurn::ToolCalls { .. }) if forced => {
                            warn!(rounds, "model kept requesting tools after the final answer prompt");
                            AttemptState::Completed(AnalysisOutcome {
                                analysis_text: INCOMPLETE_TEXT.to_string(),
                                suggested_actions: Vec::new(),
                                confidence: None,
                                status: AnalysisStatus::Completed,
                            })
                        }
                        Ok(ModelTurn::ToolCalls { text, calls }) => {
                            conversation.push_assistant(text, calls.clone());
                            AttemptState::ToolDispatch(calls)
                        }
                        Err(err) => {
                            error!(error = %err, "model exchange failed");
                            AttemptState::Failed(format!("Analysis failed: {err}"))
                        }
                    }
                }
                AttemptState::ToolDispatch(calls) => {
                    rounds += 1;
                    let results = join_all(calls.iter().map(|call| self.dispatch(&tools, call))).await;
                    for result in results {
                        if let Err(err) = &result.outcome {
                            failures += 1;
                            warn!(tool = %result.tool_name, code = err.code(), error = %err, "tool call failed");
                        }
                        conversation.push_tool(result.tool_name.clone(), result.to_message_content());
                    }
                    if rounds >= self.settings.max_rounds || failures >= self.settings.max_failures {
                        info!(rounds, failures, "tool budget spent, requesting final answer");
                        conversation.push_user(FINAL_ANSWER_PROMPT);
                        forced = true;
                    }
                    AttemptState::Conversing
                }
                AttemptState::Parsing(text) => {
                    let parsed = parse_answer(&text);
                    if parsed.confidence.is_none() {
                        debug!("final answer carried no usable confidence");
                    }
                    AttemptState::Completed(AnalysisOutcome {
                        analysis_text: parsed.analysis_text,
                        suggested_actions: parsed.suggested_actions,
                        confidence: parsed.confidence,
                        status: AnalysisStatus::Completed,
                    })
                }
                AttemptState::Completed(outcome) => return outcome,
                AttemptState::Failed(message) => return AnalysisOutcome::failed(message),
            };
        }
    }

    async fn list_tools(&self) -> Vec<ToolSpec> {
        match tokio::time::timeout(self.settings.tool_timeout, self.tools.list_tools()).await {
            Ok(Ok(tools)) => tools,
            Ok(Err(err)) => {
                warn!(error = %err, "tool listing failed, continuing without tools");
                Vec::new()
            }
            Err(_) => {
                warn!("tool listing timed out, continuing without tools");
                Vec::new()
            }
        }
    }

    /// One model exchange, retrying transient failures with doubling delays.
    async fn converse(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, ModelError> {
        let limit = self.settings.model_timeout;
        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(limit, self.model.converse(conversation, tools)).await
            {
                Ok(result) => result,
                Err(_) => Err(ModelError::Timeout { after: limit }),
            };
            match result {
                Err(err) if err.is_retryable() && attempt < self.settings.max_retries => {
                    let delay = self
                        .settings
                        .retry_backoff
                        .saturating_mul(1u32 << attempt.min(16));
                    warn!(error = %err, attempt, delay_ms = delay.as_millis(), "retrying model exchange");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn dispatch(&self, tools: &[ToolSpec], call: &ToolCall) -> ToolResult {
        let name = call.tool_name.clone();
        let Some(spec) = tools.iter().find(|spec| spec.name == name) else {
            return ToolResult::err(name.clone(), ToolError::UnknownTool { name });
        };
        let arguments = match normalize_arguments(call.arguments.clone()) {
            Ok(arguments) => arguments,
            Err(message) => {
                return ToolResult::err(name.clone(), ToolError::InvalidArguments { name, message });
            }
        };
        if let Err(message) = validate_arguments(&spec.input_schema, &arguments) {
            return ToolResult::err(name.clone(), ToolError::InvalidArguments { name, message });
        }

        let limit = self.settings.tool_timeout;
        let call = ToolCall::new(name.clone(), arguments);
        match tokio::time::timeout(limit, self.tools.call(&call)).await {
            Ok(result) => result,
            Err(_) => ToolResult::err(name.clone(), ToolError::Timeout { name, after: limit }),
        }
    }
}

/// `now`, pushed past `latest` when the clock has not advanced beyond it.
fn next_timestamp(now: DateTime<Utc>, latest: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match latest {
        Some(latest) if latest >= now => latest + TimeDelta::microseconds(1),
        _ => now,
    }
}
