use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use tail_model::{ExecutionId, OutputEvent};

use crate::{connection::ConnectionManager, error::BusError, frame::Frame, sync::lock};

type EventHandler = Box<dyn FnMut(OutputEvent) + Send>;

/// Opens per-execution topic subscriptions on the shared connection.
#[derive(Clone)]
pub struct EventSubscriber {
    conn: ConnectionManager,
}

impl EventSubscriber {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Subscribe to the output topic of `execution`.
    ///
    /// Fails immediately with [`BusError::NotConnected`] when the connection is
    /// not usable; nothing is queued or retried. Each decoded event is handed
    /// to `on_event` in receive order. Events published before this call are
    /// not replayed. Bodies that do not decode are logged and skipped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(&self, execution: &ExecutionId, on_event: F) -> Result<Subscription, BusError>
    where
        F: FnMut(OutputEvent) + Send + 'static,
    {
        if !self.conn.is_usable() {
            error!(execution_id = %execution, "event bus not connected; subscribe aborted");
            return Err(BusError::NotConnected);
        }

        let id = self.conn.next_subscription_id();
        let destination = execution.topic();
        let (tx, rx) = mpsc::unbounded_channel();

        // Route first so nothing delivered right after SUBSCRIBE is dropped.
        self.conn.add_route(&id, tx);
        if let Err(e) = self.conn.send(Frame::subscribe(&id, &destination)) {
            self.conn.remove_route(&id);
            error!(execution_id = %execution, error = %e, "subscribe frame not sent");
            return Err(e);
        }

        let on_event: EventHandler = Box::new(on_event);
        let handler = Arc::new(Mutex::new(Some(on_event)));
        let token = CancellationToken::new();
        tokio::spawn(pump(
            rx,
            Arc::clone(&handler),
            token.clone(),
            id.clone(),
            execution.clone(),
        ));
        debug!(execution_id = %execution, subscription = %id, %destination, "subscribed");

        Ok(Subscription {
            id,
            execution: execution.clone(),
            conn: self.conn.clone(),
            handler,
            token,
            cancelled: AtomicBool::new(false),
        })
    }
}

async fn pump(
    mut rx: mpsc::UnboundedReceiver<Frame>,
    handler: Arc<Mutex<Option<EventHandler>>>,
    token: CancellationToken,
    id: String,
    execution: ExecutionId,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let event = match OutputEvent::decode(&frame.body) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    execution_id = %execution,
                    subscription = %id,
                    error = %e,
                    body = %frame.body,
                    "malformed output event skipped"
                );
                continue;
            }
        };

        let mut guard = lock(&handler);
        match guard.as_mut() {
            Some(on_event) => on_event(event),
            None => break,
        }
    }
    trace!(execution_id = %execution, subscription = %id, "subscription pump stopped");
}

/// Handle to one live topic subscription.
///
/// Release it with [`cancel`](Self::cancel); dropping the handle does not unsubscribe.
pub struct Subscription {
    id: String,
    execution: ExecutionId,
    conn: ConnectionManager,
    handler: Arc<Mutex<Option<EventHandler>>>,
    token: CancellationToken,
    cancelled: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn execution(&self) -> &ExecutionId {
        &self.execution
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
    }

    /// Release the topic subscription.
    ///
    /// Only the first call has an effect. Once it returns, the event handler
    /// has been dropped and is never invoked again; a delivery already in
    /// progress is waited for. Must not be called from inside the handler.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();
        lock(&self.handler).take();
        self.conn.remove_route(&self.id);

        if self.conn.is_usable()
            && let Err(e) = self.conn.send(Frame::unsubscribe(&self.id))
        {
            debug!(subscription = %self.id, error = %e, "unsubscribe frame not sent");
        }
        debug!(execution_id = %self.execution, subscription = %self.id, "unsubscribed");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("execution", &self.execution)
            .field("active", &self.is_active())
            .finish()
    }
}
