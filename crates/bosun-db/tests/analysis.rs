//! End-to-end analysis runs against a real SQLite store with scripted model,
//! embedder and tool collaborators.

use async_trait::async_trait;
use bosun_core::analyses::AnalysisRepository;
use bosun_core::analyzer::{ABANDONED_TEXT, FINISH_ATTEMPTS, INCOMPLETE_TEXT};
use bosun_core::embed::Embedder;
use bosun_core::error::{AnalysisError, EmbedError, ModelError, ToolError};
use bosun_core::events::EventRepository;
use bosun_core::knowledge::KnowledgeRepository;
use bosun_core::model::{Conversation, Message, ModelDriver, ModelTurn};
use bosun_core::prompt::FINAL_ANSWER_PROMPT;
use bosun_core::store::{Store, StoreProvider};
use bosun_core::tools::ToolRegistry;
use bosun_core::types::{
    AnalysisStatus, EventId, KnowledgeChunk, ToolCall, ToolResult, ToolSpec,
};
use bosun_core::{Analyzer, BosunConfig, BosunError};
use bosun_db::SqliteProvider;
use chrono::Utc;
use serde_json::json;
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const FINAL_ANSWER: &str = "**ANALYSIS:**\nCoolant flow dropped before the temperature spike.\n\n**CONFIDENCE:** 75%\n\n**SUGGESTED ACTIONS:**\n1. Inspect the raw water pump impeller\n2. Check the heat exchanger for fouling\n";

struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelTurn, ModelError>>>,
    fallback: ModelTurn,
    delay: Duration,
    seen: Mutex<Vec<(Conversation, Vec<ToolSpec>)>>,
}

impl ScriptedModel {
    fn new(script: Vec<Result<ModelTurn, ModelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: final_turn(FINAL_ANSWER),
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answers tool calls forever.
    fn relentless() -> Self {
        let mut model = Self::new(Vec::new());
        model.fallback = telemetry_call();
        model
    }

    fn slow(delay: Duration) -> Self {
        let mut model = Self::new(Vec::new());
        model.delay = delay;
        model
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelDriver for ScriptedModel {
    fn model_used(&self) -> String {
        "scripted".to_string()
    }

    async fn converse(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, ModelError> {
        self.seen
            .lock()
            .unwrap()
            .push((conversation.clone(), tools.to_vec()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

struct FixedEmbedder {
    vector: Vec<f32>,
    fail: bool,
}

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model(&self) -> &str {
        "test-embed"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        if self.fail {
            return Err(EmbedError::Unavailable {
                message: "connection refused".to_string(),
            });
        }
        Ok(self.vector.clone())
    }
}

#[derive(Default)]
struct RecordingTools {
    calls: Mutex<Vec<ToolCall>>,
}

fn telemetry_spec() -> ToolSpec {
    ToolSpec {
        name: "get_telemetry".to_string(),
        description: "Recent readings for one vessel sensor".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "vessel_id": {"type": "string"},
                "sensor_name": {"type": "string"},
                "minutes_back": {"type": "integer", "minimum": 1, "maximum": 1440}
            },
            "required": ["vessel_id", "sensor_name"],
            "additionalProperties": false
        }),
    }
}

#[async_trait]
impl ToolRegistry for RecordingTools {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        Ok(vec![telemetry_spec()])
    }

    async fn call(&self, call: &ToolCall) -> ToolResult {
        self.calls.lock().unwrap().push(call.clone());
        ToolResult::ok(
            call.tool_name.clone(),
            json!({"readings": [{"timestamp": "2026-03-01T11:58:00Z", "value": 97.5}]}),
        )
    }
}

/// Sleeps `minutes_back` times `unit` before answering, so calls in one round
/// finish in a different order than they were requested.
struct SlowTools {
    unit: Duration,
    finished: Mutex<Vec<String>>,
}

impl SlowTools {
    fn new(unit: Duration) -> Self {
        Self {
            unit,
            finished: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ToolRegistry for SlowTools {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        Ok(vec![telemetry_spec()])
    }

    async fn call(&self, call: &ToolCall) -> ToolResult {
        let minutes = call.arguments["minutes_back"].as_u64().unwrap_or(1);
        tokio::time::sleep(self.unit * minutes as u32).await;
        let sensor = call.arguments["sensor_name"].as_str().unwrap_or_default().to_string();
        self.finished.lock().unwrap().push(sensor.clone());
        ToolResult::ok(call.tool_name.clone(), json!({"sensor_name": sensor, "readings": []}))
    }
}

/// SQLite provider whose `open` fails for the given 1-based call numbers.
#[derive(Clone)]
struct FlakyProvider {
    inner: SqliteProvider,
    opens: Arc<AtomicUsize>,
    failing: RangeInclusive<usize>,
}

impl StoreProvider for FlakyProvider {
    type Store = <SqliteProvider as StoreProvider>::Store;

    fn open(&self) -> Result<Self::Store, BosunError> {
        let call = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.contains(&call) {
            return Err(BosunError::internal("disk I/O error"));
        }
        self.inner.open()
    }
}

fn final_turn(text: &str) -> ModelTurn {
    ModelTurn::Final {
        text: text.to_string(),
    }
}

fn telemetry_call() -> ModelTurn {
    ModelTurn::ToolCalls {
        text: String::new(),
        calls: vec![sensor_call("engine_temp", 30)],
    }
}

fn sensor_call(sensor: &str, minutes_back: u64) -> ToolCall {
    ToolCall::new(
        "get_telemetry",
        json!({"vessel_id": "V001", "sensor_name": sensor, "minutes_back": minutes_back}),
    )
}

fn tool_messages(conversation: &Conversation) -> Vec<String> {
    conversation
        .messages()
        .iter()
        .filter_map(|message| match message {
            Message::Tool { content, .. } => Some(content.clone()),
            _ => None,
        })
        .collect()
}

struct Harness {
    _dir: TempDir,
    provider: SqliteProvider,
    config: BosunConfig,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let provider = SqliteProvider::new(dir.path().join("bosun.db")).unwrap();
        let mut config = BosunConfig::default();
        config.model.retry_backoff_ms = 1;
        Self {
            _dir: dir,
            provider,
            config,
        }
    }

    fn seed_event(&self, id: i64) -> EventId {
        let store = self.provider.open().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO events (id, timestamp, vessel_id, sensor_name, event_type, severity, details) \
                 VALUES (?1, '2026-03-01T12:00:00.000000Z', 'V001', 'engine_temp', 'HIGH_TEMPERATURE', 'high', 'temp 97.5C')",
                [id],
            )
            .unwrap();
        EventId::new(id).unwrap()
    }

    fn seed_chunk(&self, embedding: Vec<f32>) {
        let store = self.provider.open().unwrap();
        store
            .knowledge()
            .upsert(&KnowledgeChunk {
                source: "engines/cooling.md".to_string(),
                chunk_index: 0,
                title: "Engine Cooling".to_string(),
                content: "High engine temperature usually follows reduced raw water flow."
                    .to_string(),
                embedding,
                embedding_model: "test-embed".to_string(),
            })
            .unwrap();
    }

    fn analyzer(
        &self,
        model: Arc<ScriptedModel>,
        tools: Arc<RecordingTools>,
        embedder_fails: bool,
    ) -> Analyzer<SqliteProvider> {
        self.analyzer_on(self.provider.clone(), model, tools, embedder_fails)
    }

    fn analyzer_on<P: StoreProvider>(
        &self,
        provider: P,
        model: Arc<ScriptedModel>,
        tools: Arc<dyn ToolRegistry>,
        embedder_fails: bool,
    ) -> Analyzer<P> {
        let embedder = Arc::new(FixedEmbedder {
            vector: vec![1.0, 0.0],
            fail: embedder_fails,
        });
        Analyzer::new(provider, embedder, tools, model, &self.config)
    }

    /// Opens are numbered from the claim: with a failing embedder the attempt
    /// itself never touches the store, so open 2 is the first terminal write.
    fn flaky(&self, failing: RangeInclusive<usize>) -> FlakyProvider {
        FlakyProvider {
            inner: self.provider.clone(),
            opens: Arc::new(AtomicUsize::new(0)),
            failing,
        }
    }

    fn rows(&self, event_id: EventId) -> Vec<bosun_core::types::Analysis> {
        let store = self.provider.open().unwrap();
        store.analyses().list_for_event(event_id).unwrap()
    }
}

fn reference_text(conversation: &Conversation) -> Option<String> {
    conversation.messages().iter().find_map(|message| match message {
        Message::User { content } if content.contains("<reference>") => Some(content.clone()),
        _ => None,
    })
}

#[tokio::test]
async fn scenario_high_temperature_with_one_tool_round() {
    let harness = Harness::new();
    let event_id = harness.seed_event(42);
    let similar = (1.0_f32 - 0.82 * 0.82).sqrt();
    harness.seed_chunk(vec![0.82, similar]);

    let model = Arc::new(ScriptedModel::new(vec![
        Ok(telemetry_call()),
        Ok(final_turn(FINAL_ANSWER)),
    ]));
    let tools = Arc::new(RecordingTools::default());
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::clone(&tools), false);

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.event_id.get(), 42);
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(analysis.confidence, Some(0.75));
    assert_eq!(analysis.suggested_actions.len(), 2);
    assert_eq!(analysis.model_used, "scripted");

    assert_eq!(tools.calls.lock().unwrap().len(), 1);
    assert_eq!(model.calls(), 2);
    let seen = model.seen.lock().unwrap();
    let reference = reference_text(&seen[0].0).expect("reference block sent");
    assert!(reference.contains("reduced raw water flow"));
    assert!(
        seen[1]
            .0
            .messages()
            .iter()
            .any(|message| matches!(message, Message::Tool { name, .. } if name == "get_telemetry"))
    );
}

#[tokio::test]
async fn repeated_requests_return_the_same_row() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let model = Arc::new(ScriptedModel::new(Vec::new()));
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::default(), false);

    let first = analyzer.analyze(event_id, false).await.unwrap();
    let second = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(model.calls(), 1);
    assert_eq!(harness.rows(event_id).len(), 1);
}

#[tokio::test]
async fn forced_runs_append_strictly_later_rows() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let analyzer = harness.analyzer(Arc::new(ScriptedModel::new(Vec::new())), Arc::default(), false);

    let first = analyzer.analyze(event_id, false).await.unwrap();
    let second = analyzer.analyze(event_id, true).await.unwrap();
    let third = analyzer.analyze(event_id, true).await.unwrap();
    assert_ne!(first.id, second.id);
    assert!(second.timestamp > first.timestamp);
    assert!(third.timestamp > second.timestamp);
    assert_eq!(harness.rows(event_id).len(), 3);

    let latest = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(latest.id, third.id);
}

#[tokio::test]
async fn endless_tool_requests_stop_at_the_round_cap() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let model = Arc::new(ScriptedModel::relentless());
    let tools = Arc::new(RecordingTools::default());
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::clone(&tools), false);
    let max_rounds = analyzer.settings().max_rounds as usize;

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(analysis.analysis_text, INCOMPLETE_TEXT);
    assert_eq!(analysis.confidence, None);
    assert_eq!(tools.calls.lock().unwrap().len(), max_rounds);
    assert_eq!(model.calls(), max_rounds + 1);
    let seen = model.seen.lock().unwrap();
    assert!(seen.last().unwrap().1.is_empty(), "no tools offered after the cap");
}

#[tokio::test]
async fn invalid_tool_arguments_are_reported_to_the_model() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let bad_call = ModelTurn::ToolCalls {
        text: String::new(),
        calls: vec![ToolCall::new("get_telemetry", json!({"vessel_id": "V001"}))],
    };
    let model = Arc::new(ScriptedModel::new(vec![Ok(bad_call)]));
    let tools = Arc::new(RecordingTools::default());
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::clone(&tools), false);

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert!(tools.calls.lock().unwrap().is_empty());
    let seen = model.seen.lock().unwrap();
    let tool_message = seen[1]
        .0
        .messages()
        .iter()
        .find_map(|message| match message {
            Message::Tool { content, .. } => Some(content.clone()),
            _ => None,
        })
        .unwrap();
    assert!(tool_message.contains("invalid_arguments"));
}

#[tokio::test]
async fn unreadable_confidence_is_stored_as_null() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let answer = "**ANALYSIS:**\nUnclear.\n\n**CONFIDENCE:** high\n\n**SUGGESTED ACTIONS:**\n1. Monitor\n";
    let model = Arc::new(ScriptedModel::new(vec![Ok(final_turn(answer))]));
    let analyzer = harness.analyzer(model, Arc::default(), false);

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(analysis.confidence, None);
    assert_eq!(analysis.suggested_actions, vec!["Monitor".to_string()]);
}

#[tokio::test]
async fn knowledge_outage_degrades_to_no_context() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    harness.seed_chunk(vec![1.0, 0.0]);
    let model = Arc::new(ScriptedModel::new(Vec::new()));
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::default(), true);

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    let seen = model.seen.lock().unwrap();
    assert!(reference_text(&seen[0].0).is_none());
}

#[tokio::test]
async fn weak_matches_are_not_sent() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    harness.seed_chunk(vec![0.5, 0.866]);
    let model = Arc::new(ScriptedModel::new(Vec::new()));
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::default(), false);

    analyzer.analyze(event_id, false).await.unwrap();
    let seen = model.seen.lock().unwrap();
    assert!(reference_text(&seen[0].0).is_none());
}

#[tokio::test]
async fn model_failure_is_persisted_as_failed() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let model = Arc::new(ScriptedModel::new(vec![Err(ModelError::Unavailable {
        message: "connection refused".to_string(),
    })]));
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::default(), false);

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Failed);
    assert!(analysis.analysis_text.contains("connection refused"));
    assert_eq!(model.calls(), 1);

    let again = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(again.id, analysis.id, "failed rows satisfy the duplicate guard");
}

#[tokio::test]
async fn rate_limits_are_retried() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let model = Arc::new(ScriptedModel::new(vec![
        Err(ModelError::RateLimited {
            message: "slow down".to_string(),
        }),
        Ok(final_turn(FINAL_ANSWER)),
    ]));
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::default(), false);

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn unknown_event_is_not_found() {
    let harness = Harness::new();
    let analyzer = harness.analyzer(Arc::new(ScriptedModel::new(Vec::new())), Arc::default(), false);
    let result = analyzer.analyze(EventId::new(404).unwrap(), false).await;
    assert!(matches!(
        result,
        Err(BosunError::Event(bosun_core::error::EventError::NotFound))
    ));
}

#[tokio::test]
async fn concurrent_first_requests_produce_one_row() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let model = Arc::new(ScriptedModel::slow(Duration::from_millis(100)));
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::default(), false);

    let (left, right) = tokio::join!(
        analyzer.analyze(event_id, false),
        analyzer.analyze(event_id, false)
    );
    let (left, right) = (left.unwrap(), right.unwrap());
    assert_eq!(left.id, right.id);
    assert_eq!(model.calls(), 1);
    let rows = harness.rows(event_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, AnalysisStatus::Completed);
}

#[tokio::test]
async fn separate_processes_share_the_storage_guard() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let model = Arc::new(ScriptedModel::slow(Duration::from_millis(150)));
    // Two analyzers do not share in-process locks, like two server processes.
    let first = harness.analyzer(Arc::clone(&model), Arc::default(), false);
    let second = harness.analyzer(Arc::clone(&model), Arc::default(), false);

    let running = tokio::spawn(async move { first.analyze(event_id, false).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let observed = second.analyze(event_id, false).await.unwrap();
    assert_eq!(observed.status, AnalysisStatus::Pending);
    let forced = second.analyze(event_id, true).await;
    assert!(matches!(
        forced,
        Err(BosunError::Analysis(AnalysisError::Conflict { .. }))
    ));

    let finished = running.await.unwrap().unwrap();
    assert_eq!(finished.id, observed.id);
    assert_eq!(finished.status, AnalysisStatus::Completed);
    assert_eq!(harness.rows(event_id).len(), 1);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn stale_pending_rows_are_abandoned() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    {
        let store = harness.provider.open().unwrap();
        store
            .analyses()
            .insert_pending(event_id, "scripted", Utc::now() - chrono::Duration::hours(2))
            .unwrap();
        assert!(store.events().get(event_id).unwrap().is_some());
    }
    let analyzer = harness.analyzer(Arc::new(ScriptedModel::new(Vec::new())), Arc::default(), false);

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    let rows = harness.rows(event_id);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].status, AnalysisStatus::Failed);
}

#[tokio::test]
async fn terminal_write_is_retried() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let provider = harness.flaky(2..=2);
    let opens = Arc::clone(&provider.opens);
    let analyzer = harness.analyzer_on(
        provider,
        Arc::new(ScriptedModel::new(Vec::new())),
        Arc::new(RecordingTools::default()),
        true,
    );

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(opens.load(Ordering::SeqCst), 3);
    let rows = harness.rows(event_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], analysis);
}

#[tokio::test]
async fn unstorable_result_is_returned_as_failed_and_replaced_later() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let last_failing = 1 + FINISH_ATTEMPTS as usize;
    let model = Arc::new(ScriptedModel::new(Vec::new()));
    let analyzer = harness.analyzer_on(
        harness.flaky(2..=last_failing),
        Arc::clone(&model),
        Arc::new(RecordingTools::default()),
        true,
    );

    let lost = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(lost.status, AnalysisStatus::Failed);
    assert!(lost.analysis_text.contains("could not be stored"));
    assert_eq!(lost.confidence, None);
    let rows = harness.rows(event_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, lost.id);
    assert_eq!(rows[0].status, AnalysisStatus::Pending);

    // The stuck row is closed and a fresh attempt runs instead of returning it.
    let retried = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(retried.status, AnalysisStatus::Completed);
    assert_ne!(retried.id, lost.id);
    assert_eq!(model.calls(), 2);
    let rows = harness.rows(event_id);
    assert_eq!(rows.len(), 2);
    let closed = rows.iter().find(|row| row.id == lost.id).unwrap();
    assert_eq!(closed.status, AnalysisStatus::Failed);
    assert_eq!(closed.analysis_text, ABANDONED_TEXT);

    let again = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(again.id, retried.id);
}

#[tokio::test]
async fn timed_out_tool_calls_spend_the_failure_budget() {
    let mut harness = Harness::new();
    harness.config.tools.call_timeout_secs = 1;
    harness.config.tools.max_failures = 1;
    let event_id = harness.seed_event(1);
    let model = Arc::new(ScriptedModel::new(vec![Ok(ModelTurn::ToolCalls {
        text: String::new(),
        calls: vec![sensor_call("engine_temp", 30)],
    })]));
    let tools = Arc::new(SlowTools::new(Duration::from_millis(100)));
    let analyzer = harness.analyzer_on(
        harness.provider.clone(),
        Arc::clone(&model),
        Arc::clone(&tools) as Arc<dyn ToolRegistry>,
        false,
    );

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(analysis.confidence, Some(0.75));
    assert!(tools.finished.lock().unwrap().is_empty());

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let results = tool_messages(&seen[1].0);
    assert_eq!(results.len(), 1);
    assert!(results[0].contains(r#""code":"timeout""#));
    assert!(seen[1].1.is_empty(), "no tools offered once the budget is spent");
}

#[tokio::test]
async fn failure_budget_forces_the_final_answer() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let max_failures = harness.config.tools.max_failures as usize;
    let bad_round = || {
        Ok(ModelTurn::ToolCalls {
            text: String::new(),
            calls: vec![ToolCall::new("get_telemetry", json!({"vessel_id": "V001"}))],
        })
    };
    let model = Arc::new(ScriptedModel::new(
        (0..max_failures).map(|_| bad_round()).collect(),
    ));
    let tools = Arc::new(RecordingTools::default());
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::clone(&tools), false);

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(analysis.confidence, Some(0.75));
    assert!(tools.calls.lock().unwrap().is_empty());

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), max_failures + 1);
    assert_eq!(seen[max_failures - 1].1.len(), 1);
    let (last, offered) = seen.last().unwrap();
    assert!(offered.is_empty());
    assert!(matches!(
        last.messages().last(),
        Some(Message::User { content }) if content == FINAL_ANSWER_PROMPT
    ));
}

#[tokio::test]
async fn hung_model_is_stored_as_failed() {
    let mut harness = Harness::new();
    harness.config.model.timeout_secs = 1;
    let event_id = harness.seed_event(1);
    let model = Arc::new(ScriptedModel::slow(Duration::from_secs(5)));
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::default(), false);

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Failed);
    assert!(analysis.analysis_text.contains("timed out"), "{}", analysis.analysis_text);
    assert_eq!(model.calls(), 1, "timeouts are not retried");
    let rows = harness.rows(event_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, AnalysisStatus::Failed);
}

#[tokio::test]
async fn dropped_request_still_finishes_its_row() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let model = Arc::new(ScriptedModel::slow(Duration::from_millis(300)));
    let analyzer = harness.analyzer(Arc::clone(&model), Arc::default(), false);

    let gave_up =
        tokio::time::timeout(Duration::from_millis(50), analyzer.analyze(event_id, false)).await;
    assert!(gave_up.is_err());

    let mut rows = harness.rows(event_id);
    for _ in 0..100 {
        if rows.first().is_some_and(|row| row.status != AnalysisStatus::Pending) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        rows = harness.rows(event_id);
    }
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, AnalysisStatus::Completed);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn every_result_of_a_round_reaches_the_next_turn() {
    let harness = Harness::new();
    let event_id = harness.seed_event(1);
    let round = ModelTurn::ToolCalls {
        text: "Checking three sensors.".to_string(),
        calls: vec![
            sensor_call("engine_temp", 8),
            sensor_call("coolant_flow", 1),
            sensor_call("oil_pressure", 4),
        ],
    };
    let model = Arc::new(ScriptedModel::new(vec![Ok(round)]));
    let tools = Arc::new(SlowTools::new(Duration::from_millis(20)));
    let analyzer = harness.analyzer_on(
        harness.provider.clone(),
        Arc::clone(&model),
        Arc::clone(&tools) as Arc<dyn ToolRegistry>,
        false,
    );

    let analysis = analyzer.analyze(event_id, false).await.unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(
        *tools.finished.lock().unwrap(),
        vec!["coolant_flow", "oil_pressure", "engine_temp"]
    );

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let results = tool_messages(&seen[1].0);
    assert_eq!(results.len(), 3);
    for (result, sensor) in results.iter().zip(["engine_temp", "coolant_flow", "oil_pressure"]) {
        assert!(result.contains(sensor), "{result}");
    }
    assert!(!seen[1].1.is_empty(), "tools still offered after one round");
}
