use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format {0:?}; accepted: text, plain, json, journald")]
    InvalidFormat(String),
    #[error("journald output needs a Linux build with the `journald` feature")]
    JournaldUnavailable,
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
    #[error("could not install the tracing subscriber: {0}")]
    Install(String),
    #[error("invalid log filter {directive:?} (from {source_name})")]
    InvalidFilter {
        directive: String,
        /// `--log-level` or the `LIVE_TAIL_LOG` override.
        source_name: &'static str,
    },
}
