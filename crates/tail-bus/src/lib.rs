//! Event-bus side of the live tail: STOMP frames over a WebSocket, one
//! process-wide [`ConnectionManager`] and per-execution topic subscriptions.

mod error;
pub use error::BusError;

mod frame;
pub use frame::{Command, Frame};

mod link;
pub use link::{Dialer, FrameSink, Link};

mod ws;
pub use ws::WsDialer;

mod memory;
pub use memory::MemoryBus;

mod connection;
pub use connection::{ConnectionManager, ConnectionState, DEFAULT_RECONNECT_DELAY};

mod subscriber;
pub use subscriber::{EventSubscriber, Subscription};

pub(crate) mod sync {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// Lock ignoring poisoning; guarded state stays consistent between statements.
    pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
