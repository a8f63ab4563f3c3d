use std::{
    fmt,
    sync::{Arc, Mutex, Weak},
};

use tracing::{debug, error, info};

use tail_bus::{EventSubscriber, Subscription};
use tail_model::{ExecutionId, OutputEvent, TaskId};

use crate::{
    locator::{ExecutionLocator, LocateHandle},
    render::Renderer,
    sink::{OutputSink, PLACEHOLDER},
    sync::lock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Discovering,
    Streaming,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Idle => "idle",
            SessionState::Discovering => "discovering",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
        })
    }
}

/// One live-tail view of a task.
///
/// `open` starts discovery; the first running execution found is subscribed
/// to and its output is rendered into the sink. The session holds at most one
/// subscription, never re-discovers once streaming, and releases everything
/// it started on `close`. The bus connection is shared and left alone.
pub struct ViewerSession {
    locator: ExecutionLocator,
    subscriber: EventSubscriber,
    sink: Arc<dyn OutputSink>,
    renderer: Renderer,
    inner: Arc<Mutex<SessionInner>>,
}

struct SessionInner {
    state: SessionState,
    task: Option<TaskId>,
    execution: Option<ExecutionId>,
    locate: Option<LocateHandle>,
    subscription: Option<Subscription>,
    /// Bumped on every `open`/`close`; a discovery result from an older
    /// generation is ignored.
    generation: u64,
}

impl SessionInner {
    fn release(&mut self) -> (Option<Subscription>, Option<LocateHandle>) {
        (self.subscription.take(), self.locate.take())
    }
}

fn cancel_all((subscription, locate): (Option<Subscription>, Option<LocateHandle>)) {
    if let Some(sub) = subscription {
        sub.cancel();
    }
    if let Some(handle) = locate {
        handle.cancel();
    }
}

impl ViewerSession {
    pub fn new(
        locator: ExecutionLocator,
        subscriber: EventSubscriber,
        sink: Arc<dyn OutputSink>,
        renderer: Renderer,
    ) -> Self {
        Self {
            locator,
            subscriber,
            sink,
            renderer,
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Idle,
                task: None,
                execution: None,
                locate: None,
                subscription: None,
                generation: 0,
            })),
        }
    }

    /// Start watching `task`.
    ///
    /// Shows the placeholder and begins discovery. Reopening an already open
    /// session releases its previous discovery and subscription first.
    /// Must be called from within a Tokio runtime.
    pub fn open(&self, task: TaskId) {
        let (previous, generation) = {
            let mut inner = lock(&self.inner);
            let previous = inner.release();
            inner.generation += 1;
            inner.state = SessionState::Discovering;
            inner.task = Some(task.clone());
            inner.execution = None;
            (previous, inner.generation)
        };
        cancel_all(previous);

        self.sink.reset(PLACEHOLDER);
        info!(task_id = %task, "live tail opened; waiting for execution");

        let on_found = {
            let inner = Arc::downgrade(&self.inner);
            let subscriber = self.subscriber.clone();
            let sink = Arc::clone(&self.sink);
            let renderer = self.renderer;
            move |execution: ExecutionId| {
                start_streaming(&inner, generation, &subscriber, sink, renderer, execution)
            }
        };
        let handle = self.locator.locate(task, on_found);

        let mut inner = lock(&self.inner);
        if inner.generation == generation && inner.state != SessionState::Closed {
            inner.locate = Some(handle);
        } else {
            drop(inner);
            handle.cancel();
        }
    }

    /// Stop watching.
    ///
    /// Cancels the subscription, if any, then the discovery run. Once it
    /// returns no output is rendered for this session. Safe to call in any
    /// state and more than once.
    pub fn close(&self) {
        let (released, task) = {
            let mut inner = lock(&self.inner);
            let released = inner.release();
            inner.generation += 1;
            let was = std::mem::replace(&mut inner.state, SessionState::Closed);
            (released, (was != SessionState::Closed).then(|| inner.task.clone()).flatten())
        };
        cancel_all(released);

        if let Some(task) = task {
            info!(task_id = %task, "live tail closed");
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner).state
    }

    pub fn task(&self) -> Option<TaskId> {
        lock(&self.inner).task.clone()
    }

    /// Execution being streamed, once discovery has found one.
    pub fn execution(&self) -> Option<ExecutionId> {
        lock(&self.inner).execution.clone()
    }

    pub fn has_subscription(&self) -> bool {
        lock(&self.inner).subscription.is_some()
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }
}

impl fmt::Debug for ViewerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("ViewerSession")
            .field("state", &inner.state)
            .field("task", &inner.task)
            .field("execution", &inner.execution)
            .field("subscribed", &inner.subscription.is_some())
            .finish()
    }
}

/// Discovery callback: subscribe and move to `Streaming`.
///
/// Runs under the session lock so a concurrent `close` either happens first
/// (and the result is ignored) or afterwards (and cancels what was stored).
fn start_streaming(
    inner: &Weak<Mutex<SessionInner>>,
    generation: u64,
    subscriber: &EventSubscriber,
    sink: Arc<dyn OutputSink>,
    renderer: Renderer,
    execution: ExecutionId,
) {
    let Some(shared) = inner.upgrade() else {
        return;
    };
    let mut inner = lock(&shared);
    if inner.generation != generation || inner.state != SessionState::Discovering {
        debug!(execution_id = %execution, "stale discovery result ignored");
        return;
    }

    sink.clear();
    let on_event = {
        let sink = Arc::clone(&sink);
        move |event: OutputEvent| sink.append(&renderer.render(&event))
    };
    let subscription = match subscriber.subscribe(&execution, on_event) {
        Ok(subscription) => subscription,
        Err(e) => {
            // Stays in Discovering; the operator has to reopen.
            sink.reset(PLACEHOLDER);
            error!(execution_id = %execution, error = %e, "live tail not started");
            return;
        }
    };

    if let Some(old) = inner.subscription.replace(subscription) {
        old.cancel();
    }
    inner.execution = Some(execution.clone());
    inner.state = SessionState::Streaming;
    info!(execution_id = %execution, "streaming execution output");
}
