use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    error::BusError,
    frame::{Command, Frame},
    link::{Dialer, FrameSink, Link},
    sync::lock,
};

/// Fixed pause between a failed or lost connection and the next dial.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Owner of the single process-wide link to the event bus.
///
/// Cheap to clone; every clone drives the same connection. A background
/// driver dials, demultiplexes inbound `MESSAGE` frames to subscription
/// routes, and redials after [`reconnect_delay`](Self::reconnect_delay) when
/// the link fails or drops. Routes do not survive a drop: events published
/// while disconnected are lost and subscriptions are not re-issued.
///
/// Holds no subscription state of its own beyond routing; callers check
/// [`is_usable`](Self::is_usable) before each use.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    dialer: Arc<dyn Dialer>,
    reconnect_delay: Duration,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Option<Box<dyn FrameSink>>>,
    routes: Mutex<HashMap<String, mpsc::UnboundedSender<Frame>>>,
    driver: Mutex<Option<CancellationToken>>,
    next_sub: AtomicU64,
}

impl ConnectionManager {
    pub fn new(dialer: Arc<dyn Dialer>, reconnect_delay: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                dialer,
                reconnect_delay,
                state,
                link: Mutex::new(None),
                routes: Mutex::new(HashMap::new()),
                driver: Mutex::new(None),
                next_sub: AtomicU64::new(0),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.inner.dialer.endpoint()
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.inner.reconnect_delay
    }

    /// Start the connection driver.
    ///
    /// No-op while a driver is already running; after [`disconnect`](Self::disconnect)
    /// it starts a fresh one. Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut driver = lock(&self.inner.driver);
        if driver.as_ref().is_some_and(|t| !t.is_cancelled()) {
            trace!(endpoint = self.endpoint(), "connect ignored: driver already running");
            return;
        }

        let token = CancellationToken::new();
        *driver = Some(token.clone());
        tokio::spawn(drive(Arc::clone(&self.inner), token));
    }

    /// Stop the driver and drop the link and every route.
    pub fn disconnect(&self) {
        let mut driver = lock(&self.inner.driver);
        if let Some(token) = driver.take() {
            token.cancel();
        }
        if let Some(link) = lock(&self.inner.link).as_ref() {
            let _ = link.send(Frame::new(Command::Disconnect));
        }
        self.inner.drop_link();
        drop(driver);
        info!(endpoint = self.endpoint(), "event bus disconnected");
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Whether a subscribe can be attempted right now.
    pub fn is_usable(&self) -> bool {
        self.state() == ConnectionState::Connected && lock(&self.inner.link).is_some()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Wait until the connection is usable.
    pub async fn ready(&self) {
        let mut rx = self.watch_state();
        while *rx.borrow_and_update() != ConnectionState::Connected {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn next_subscription_id(&self) -> String {
        format!("sub-{}", self.inner.next_sub.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn send(&self, frame: Frame) -> Result<(), BusError> {
        match lock(&self.inner.link).as_ref() {
            Some(link) => link.send(frame),
            None => Err(BusError::NotConnected),
        }
    }

    pub(crate) fn add_route(&self, id: &str, tx: mpsc::UnboundedSender<Frame>) {
        lock(&self.inner.routes).insert(id.to_string(), tx);
    }

    pub(crate) fn remove_route(&self, id: &str) {
        lock(&self.inner.routes).remove(id);
    }
}

impl Inner {
    /// Apply `f` only while `token` still owns the connection.
    ///
    /// Serialised with `disconnect` through the driver lock, so a stale
    /// driver can never publish a link after being cancelled.
    fn while_current(&self, token: &CancellationToken, f: impl FnOnce(&Self)) -> bool {
        let _driver = lock(&self.driver);
        if token.is_cancelled() {
            return false;
        }
        f(self);
        true
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn drop_link(&self) {
        lock(&self.link).take();
        lock(&self.routes).clear();
        self.set_state(ConnectionState::Disconnected);
    }

    fn route(&self, frame: Frame) {
        match frame.command {
            Command::Message => {
                let Some(sub) = frame.get("subscription").map(str::to_string) else {
                    warn!("MESSAGE without subscription header dropped");
                    return;
                };
                let mut routes = lock(&self.routes);
                match routes.get(&sub).map(|tx| tx.send(frame).is_ok()) {
                    Some(true) => {}
                    Some(false) => {
                        routes.remove(&sub);
                    }
                    None => trace!(subscription = %sub, "message for unknown subscription dropped"),
                }
            }
            Command::Error => {
                warn!(
                    message = frame.get("message").unwrap_or("no message"),
                    body = %frame.body,
                    "broker reported an error"
                );
            }
            other => trace!(command = %other, "ignoring frame"),
        }
    }
}

/// One driver per `connect`: dial, pump, wait, repeat. The loop stands in
/// for re-entrant reconnect callbacks so repeated immediate failures never
/// grow the stack.
async fn drive(inner: Arc<Inner>, token: CancellationToken) {
    let endpoint = inner.dialer.endpoint().to_string();
    let delay_ms = inner.reconnect_delay.as_millis() as u64;

    loop {
        if !inner.while_current(&token, |i| i.set_state(ConnectionState::Connecting)) {
            break;
        }
        debug!(%endpoint, "dialing event bus");

        let dialed = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            r = inner.dialer.dial() => r,
        };

        match dialed {
            Ok(Link {
                outbound,
                mut inbound,
            }) => {
                let published = inner.while_current(&token, |i| {
                    *lock(&i.link) = Some(outbound);
                    i.set_state(ConnectionState::Connected);
                });
                if !published {
                    break;
                }
                info!(%endpoint, "event bus connected");

                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return,
                        frame = inbound.recv() => match frame {
                            Some(frame) => inner.route(frame),
                            None => break,
                        },
                    }
                }

                if !inner.while_current(&token, Inner::drop_link) {
                    break;
                }
                warn!(%endpoint, delay_ms, "event bus connection lost; reconnecting");
            }
            Err(e) => {
                if !inner.while_current(&token, |i| i.set_state(ConnectionState::Disconnected)) {
                    break;
                }
                warn!(%endpoint, delay_ms, error = %e, "event bus connection error; retrying");
            }
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(inner.reconnect_delay) => {}
        }
    }
    trace!(%endpoint, "connection driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBus;

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connects_and_reports_usable() {
        let bus = MemoryBus::new();
        let conn = ConnectionManager::new(Arc::new(bus.clone()), DEFAULT_RECONNECT_DELAY);
        assert!(!conn.is_usable());

        conn.connect();
        conn.ready().await;

        assert!(conn.is_usable());
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(bus.link_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_twice_keeps_one_driver() {
        let bus = MemoryBus::new();
        let conn = ConnectionManager::new(Arc::new(bus.clone()), DEFAULT_RECONNECT_DELAY);

        conn.connect();
        conn.connect();
        conn.ready().await;
        settle().await;

        assert_eq!(bus.dial_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dial_retries_once_per_delay() {
        let bus = MemoryBus::new();
        bus.refuse_dials(true);
        let conn = ConnectionManager::new(Arc::new(bus.clone()), DEFAULT_RECONNECT_DELAY);

        conn.connect();
        settle().await;
        assert_eq!(bus.dial_count(), 1);
        assert!(!conn.is_usable());

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(bus.dial_count(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(bus.dial_count(), 2);

        bus.refuse_dials(false);
        tokio::time::sleep(DEFAULT_RECONNECT_DELAY).await;
        conn.ready().await;
        assert!(conn.is_usable());
        assert_eq!(bus.dial_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_link_reconnects_after_delay() {
        let bus = MemoryBus::new();
        let conn = ConnectionManager::new(Arc::new(bus.clone()), Duration::from_secs(1));

        conn.connect();
        conn.ready().await;

        bus.drop_links();
        settle().await;
        assert!(!conn.is_usable());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        conn.ready().await;
        assert!(conn.is_usable());
        assert_eq!(bus.dial_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_then_connect_redials() {
        let bus = MemoryBus::new();
        let conn = ConnectionManager::new(Arc::new(bus.clone()), DEFAULT_RECONNECT_DELAY);

        conn.connect();
        conn.ready().await;
        conn.disconnect();
        settle().await;

        assert!(!conn.is_usable());
        assert_eq!(bus.link_count(), 0);

        conn.connect();
        conn.ready().await;
        assert_eq!(bus.dial_count(), 2);
    }
}
