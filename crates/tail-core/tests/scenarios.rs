use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use time::UtcOffset;

use tail_api::{ApiError, ExecutionApi};
use tail_bus::{DEFAULT_RECONNECT_DELAY, MemoryBus};
use tail_core::{
    BufferSink, ExecutionLocator, LiveTail, LocateOutcome, LocatorConfig, PLACEHOLDER, Renderer,
    SessionState,
};
use tail_model::{
    ExecutionDetail, ExecutionId, ExecutionSummary, OutputEvent, OutputKind, TaskId,
};

type Answer = Result<Vec<ExecutionSummary>, ApiError>;

/// Running-executions API whose answer to poll `n` comes from a script.
struct ScriptedApi {
    script: Box<dyn Fn(usize) -> Answer + Send + Sync>,
    polls: AtomicUsize,
    queried: Mutex<Vec<TaskId>>,
}

impl ScriptedApi {
    fn new(script: impl Fn(usize) -> Answer + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            polls: AtomicUsize::new(0),
            queried: Mutex::new(Vec::new()),
        })
    }

    /// Nothing runs before poll `from`; afterwards `ids` are reported in order.
    fn running_from(from: usize, ids: &'static [&'static str]) -> Arc<Self> {
        Self::new(move |n| {
            Ok(if n >= from {
                ids.iter().map(|id| ExecutionSummary::new(*id)).collect()
            } else {
                Vec::new()
            })
        })
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionApi for ScriptedApi {
    async fn running_executions(&self, task: &TaskId) -> Answer {
        self.queried.lock().unwrap().push(task.clone());
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        (self.script)(n)
    }

    async fn execution_detail(&self, id: &ExecutionId) -> Result<ExecutionDetail, ApiError> {
        Err(ApiError::Status {
            status: 404,
            url: format!("/execution/{id}"),
        })
    }

    async fn execute_task(&self, _task: &TaskId, _csrf: Option<&str>) -> Result<(), ApiError> {
        Ok(())
    }
}

struct Harness {
    api: Arc<ScriptedApi>,
    bus: MemoryBus,
    client: LiveTail,
}

async fn harness(api: Arc<ScriptedApi>) -> Harness {
    let bus = MemoryBus::new();
    let client = LiveTail::new(
        api.clone(),
        Arc::new(bus.clone()),
        LocatorConfig::default(),
        DEFAULT_RECONNECT_DELAY,
    )
    .with_renderer(Renderer::with_offset(UtcOffset::UTC));
    client.connect();
    client.connection().ready().await;
    Harness { api, bus, client }
}

async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

fn publish(bus: &MemoryBus, execution: &str, kind: OutputKind, content: &str, ts: i64) {
    let body = OutputEvent::new(kind, content, ts).encode().unwrap();
    bus.publish(&ExecutionId::from(execution).topic(), &body);
}

#[tokio::test(start_paused = true)]
async fn nothing_running_keeps_session_discovering() {
    let h = harness(ScriptedApi::running_from(usize::MAX, &[])).await;
    let sink = Arc::new(BufferSink::new());

    let session = h.client.open_session(TaskId::from("build-task"), sink.clone());
    tokio::time::sleep(Duration::from_secs(35)).await;
    settle().await;

    assert_eq!(session.state(), SessionState::Discovering);
    assert_eq!(sink.lines(), vec![PLACEHOLDER.to_string()]);
    assert!(!session.has_subscription());
    assert!(h.bus.subscribe_log().is_empty());

    let polls = h.api.polls();
    assert!((29..=30).contains(&polls), "polls = {polls}");
    assert!(
        h.api
            .queried
            .lock()
            .unwrap()
            .iter()
            .all(|t| t.as_str() == "build-task")
    );
}

#[tokio::test(start_paused = true)]
async fn execution_found_at_two_seconds_is_subscribed_once() {
    let h = harness(ScriptedApi::running_from(1, &["exec-42"])).await;
    let sink = Arc::new(BufferSink::new());

    let session = h.client.open_session(TaskId::from("build-task"), sink.clone());
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(session.state(), SessionState::Discovering);

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;

    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(session.execution(), Some(ExecutionId::from("exec-42")));
    assert_eq!(h.bus.subscribe_log(), vec!["/topic/execution/exec-42".to_string()]);
    assert_eq!(h.api.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn streamed_events_render_in_order_with_timestamps() {
    let h = harness(ScriptedApi::running_from(0, &["exec-42"])).await;
    let sink = Arc::new(BufferSink::new());

    let session = h.client.open_session(TaskId::from("build-task"), sink.clone());
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    settle().await;
    assert_eq!(session.state(), SessionState::Streaming);

    // 2024-01-01T12:00:00Z onwards
    let t0 = 1_704_110_400_000;
    publish(&h.bus, "exec-42", OutputKind::Start, "Starting", t0);
    publish(&h.bus, "exec-42", OutputKind::Stdout, "line1", t0 + 1_000);
    publish(&h.bus, "exec-42", OutputKind::Stdout, "line2", t0 + 2_000);
    publish(&h.bus, "exec-42", OutputKind::End, "Finished", t0 + 3_000);
    settle().await;

    assert_eq!(
        sink.lines(),
        vec![
            "[12:00:00] 🚀 Starting",
            "[12:00:01] line1",
            "[12:00:02] line2",
            "[12:00:03] ✅ Finished",
        ]
    );
    // END does not end the session.
    assert_eq!(session.state(), SessionState::Streaming);
}

#[tokio::test(start_paused = true)]
async fn close_mid_stream_stops_rendering() {
    let h = harness(ScriptedApi::running_from(0, &["exec-42"])).await;
    let sink = Arc::new(BufferSink::new());

    let session = h.client.open_session(TaskId::from("build-task"), sink.clone());
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    settle().await;

    publish(&h.bus, "exec-42", OutputKind::Stdout, "before", 0);
    settle().await;
    session.close();

    publish(&h.bus, "exec-42", OutputKind::Stdout, "after", 1_000);
    settle().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(sink.lines(), vec!["[00:00:00] before"]);
    assert_eq!(h.bus.subscriber_count("/topic/execution/exec-42"), 0);
    // The shared connection outlives the session.
    assert!(h.client.connection().is_usable());
}

#[tokio::test(start_paused = true)]
async fn close_during_discovery_prevents_late_match() {
    let h = harness(ScriptedApi::running_from(4, &["exec-9"])).await;
    let sink = Arc::new(BufferSink::new());

    let session = h.client.open_session(TaskId::from("build-task"), sink.clone());
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    session.close();
    let polls = h.api.polls();

    tokio::time::sleep(Duration::from_secs(40)).await;
    settle().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(h.api.polls(), polls);
    assert!(h.bus.subscribe_log().is_empty());
    assert_eq!(sink.lines(), vec![PLACEHOLDER.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn only_first_running_execution_is_followed() {
    let h = harness(ScriptedApi::running_from(0, &["exec-1", "exec-2"])).await;
    let sink = Arc::new(BufferSink::new());

    let session = h.client.open_session(TaskId::from("t"), sink.clone());
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    settle().await;

    publish(&h.bus, "exec-2", OutputKind::Stdout, "ignored", 0);
    publish(&h.bus, "exec-1", OutputKind::Stdout, "followed", 0);
    settle().await;

    assert_eq!(session.execution(), Some(ExecutionId::from("exec-1")));
    assert_eq!(h.bus.subscribe_log(), vec!["/topic/execution/exec-1".to_string()]);
    assert_eq!(sink.lines(), vec!["[00:00:00] followed"]);
}

#[tokio::test(start_paused = true)]
async fn failing_polls_do_not_shorten_discovery() {
    let api = ScriptedApi::new(|n| match n {
        0..=9 => Err(ApiError::Status {
            status: 503,
            url: "/api/tasks/t/running-executions".into(),
        }),
        _ => Ok(vec![ExecutionSummary::new("exec-5")]),
    });
    let h = harness(api).await;
    let sink = Arc::new(BufferSink::new());

    let session = h.client.open_session(TaskId::from("t"), sink);
    tokio::time::sleep(Duration::from_secs(12)).await;
    settle().await;

    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(h.api.polls(), 11);
}

#[tokio::test(start_paused = true)]
async fn cancel_handles_are_idempotent() {
    let api = ScriptedApi::running_from(0, &["exec-3"]);
    let locator = ExecutionLocator::new(api, LocatorConfig::default());

    let handle = locator.locate(TaskId::from("t"), |_| {});
    handle.cancel();
    handle.cancel();
    assert_eq!(handle.finished().await, LocateOutcome::Cancelled);

    let finished = locator.locate(TaskId::from("t"), |_| {});
    assert_eq!(
        finished.finished().await,
        LocateOutcome::Found(ExecutionId::from("exec-3"))
    );
    finished.cancel();
    finished.cancel();

    let h = harness(ScriptedApi::running_from(0, &["exec-3"])).await;
    let session = h.client.open_session(TaskId::from("t"), Arc::new(BufferSink::new()));
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    settle().await;
    session.close();
    session.close();
    assert_eq!(h.bus.subscriber_count("/topic/execution/exec-3"), 0);
}

#[tokio::test(start_paused = true)]
async fn detail_failure_propagates() {
    let h = harness(ScriptedApi::running_from(0, &[])).await;
    let res = h.client.execution_detail(&ExecutionId::from("42")).await;
    assert!(res.is_err());
}
