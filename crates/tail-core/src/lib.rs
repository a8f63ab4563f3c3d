mod error;
pub use error::CoreError;

mod config;
pub use config::ClientConfig;

mod locator;
pub use locator::{ExecutionLocator, LocateHandle, LocateOutcome, LocatorConfig};

mod render;
pub use render::Renderer;

mod sink;
pub use sink::{BufferSink, ConsoleSink, OutputSink, PLACEHOLDER};

mod session;
pub use session::{SessionState, ViewerSession};

pub mod detail;

mod client;
pub use client::LiveTail;

pub(crate) mod sync {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
