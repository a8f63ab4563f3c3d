use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior, interval_at, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use tail_api::ExecutionApi;
use tail_model::{ExecutionId, TaskId};

use crate::sync::lock;

type FoundCallback = Box<dyn FnOnce(ExecutionId) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorConfig {
    /// Period between running-execution queries.
    pub poll_interval: Duration,
    /// Discovery window, measured from the `locate` call.
    pub timeout: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// How a discovery run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateOutcome {
    /// A running execution was found and handed to the callback.
    Found(ExecutionId),
    /// The window elapsed with no running execution.
    TimedOut,
    /// The handle was cancelled first.
    Cancelled,
}

/// Polls the execution API until a run of the requested task shows up.
#[derive(Clone)]
pub struct ExecutionLocator {
    api: Arc<dyn ExecutionApi>,
    cfg: LocatorConfig,
}

impl ExecutionLocator {
    pub fn new(api: Arc<dyn ExecutionApi>, cfg: LocatorConfig) -> Self {
        Self { api, cfg }
    }

    pub fn config(&self) -> LocatorConfig {
        self.cfg
    }

    /// Start discovery for `task`.
    ///
    /// Every `poll_interval` the API is asked for running executions of
    /// `task`. The first element of the first non-empty answer wins: polling
    /// stops and `on_found` runs exactly once with its id. Failed polls are
    /// logged and polling continues. When `timeout` elapses first, discovery
    /// stops silently and `on_found` is dropped uncalled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn locate<F>(&self, task: TaskId, on_found: F) -> LocateHandle
    where
        F: FnOnce(ExecutionId) + Send + 'static,
    {
        let on_found: FoundCallback = Box::new(on_found);
        let slot = Arc::new(Mutex::new(Some(on_found)));
        let token = CancellationToken::new();
        let (outcome_tx, outcome_rx) = watch::channel(None);

        tokio::spawn(run(
            Arc::clone(&self.api),
            self.cfg,
            task,
            Arc::clone(&slot),
            token.clone(),
            outcome_tx,
        ));

        LocateHandle {
            token,
            slot,
            outcome: outcome_rx,
        }
    }
}

async fn run(
    api: Arc<dyn ExecutionApi>,
    cfg: LocatorConfig,
    task: TaskId,
    slot: Arc<Mutex<Option<FoundCallback>>>,
    token: CancellationToken,
    outcome_tx: watch::Sender<Option<LocateOutcome>>,
) {
    let deadline = sleep(cfg.timeout);
    tokio::pin!(deadline);

    let mut ticker = interval_at(Instant::now() + cfg.poll_interval, cfg.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut polls = 0u32;
    let outcome = loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break LocateOutcome::Cancelled,
            _ = &mut deadline => break LocateOutcome::TimedOut,
            _ = ticker.tick() => {}
        }

        polls += 1;
        let answer = tokio::select! {
            biased;
            _ = token.cancelled() => break LocateOutcome::Cancelled,
            _ = &mut deadline => break LocateOutcome::TimedOut,
            answer = api.running_executions(&task) => answer,
        };

        match answer {
            Ok(list) => match list.into_iter().next() {
                Some(first) => break LocateOutcome::Found(first.id),
                None => trace!(task_id = %task, polls, "no running execution yet"),
            },
            Err(e) => warn!(task_id = %task, polls, error = %e, "error checking executions"),
        }
    };

    let outcome = match outcome {
        LocateOutcome::Found(id) => {
            // Invoked with the slot held: `cancel` waits for a callback in flight.
            let mut slot = lock(&slot);
            match slot.take() {
                Some(on_found) => {
                    info!(task_id = %task, execution_id = %id, polls, "running execution found");
                    on_found(id.clone());
                    LocateOutcome::Found(id)
                }
                None => LocateOutcome::Cancelled,
            }
        }
        LocateOutcome::TimedOut => {
            lock(&slot).take();
            debug!(
                task_id = %task,
                polls,
                timeout_ms = cfg.timeout.as_millis() as u64,
                "no running execution within discovery window; polling stopped"
            );
            LocateOutcome::TimedOut
        }
        LocateOutcome::Cancelled => {
            trace!(task_id = %task, polls, "discovery cancelled");
            LocateOutcome::Cancelled
        }
    };

    outcome_tx.send_replace(Some(outcome));
}

/// Cancels a discovery run and reports how it ended.
pub struct LocateHandle {
    token: CancellationToken,
    slot: Arc<Mutex<Option<FoundCallback>>>,
    outcome: watch::Receiver<Option<LocateOutcome>>,
}

impl LocateHandle {
    /// Stop polling and the deadline.
    ///
    /// Safe at any time and any number of times, including after discovery
    /// has already found a match or timed out. Once it returns, `on_found`
    /// is neither running nor able to start: a callback already in progress
    /// is waited for. Must not be called from inside `on_found`.
    pub fn cancel(&self) {
        self.token.cancel();
        lock(&self.slot).take();
    }

    /// Outcome, once discovery has ended.
    pub fn outcome(&self) -> Option<LocateOutcome> {
        self.outcome.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Wait for discovery to end.
    pub async fn finished(&self) -> LocateOutcome {
        let mut rx = self.outcome.clone();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return LocateOutcome::Cancelled;
            }
        }
    }
}

impl std::fmt::Debug for LocateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocateHandle")
            .field("cancelled", &self.token.is_cancelled())
            .field("outcome", &self.outcome())
            .finish()
    }
}
