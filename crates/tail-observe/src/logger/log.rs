use std::io;

use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError};

/// Environment variable that overrides the configured level when set.
const LEVEL_ENV: &str = "LIVE_TAIL_LOG";

/// Filter directive in effect and where it came from.
struct Directive {
    text: String,
    source_name: &'static str,
}

pub struct Logger;

// Diagnostics go to stderr: stdout belongs to the rendered tail output.
// Each installer returns the filter directive it applied.
impl Logger {
    pub fn text(cfg: &LoggerConfig) -> Result<String, LoggerError> {
        let (filter, directive) = mk_filter(&cfg.level)?;
        let fmt_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer());

        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
        init_with(subscriber).map(|_| directive)
    }

    pub fn json(cfg: &LoggerConfig) -> Result<String, LoggerError> {
        let (filter, directive) = mk_filter(&cfg.level)?;
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_ansi(false)
            .with_current_span(true)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer());

        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
        init_with(subscriber).map(|_| directive)
    }

    pub fn journald(cfg: &LoggerConfig) -> Result<String, LoggerError> {
        let (filter, directive) = mk_filter(&cfg.level)?;
        mk_journald(filter).map(|_| directive)
    }
}

fn directive(level: &str, env: Option<String>) -> Directive {
    match env.filter(|v| !v.trim().is_empty()) {
        Some(text) => Directive {
            text,
            source_name: LEVEL_ENV,
        },
        None => Directive {
            text: level.to_string(),
            source_name: "--log-level",
        },
    }
}

fn mk_filter(level: &str) -> Result<(EnvFilter, String), LoggerError> {
    let Directive { text, source_name } = directive(level, std::env::var(LEVEL_ENV).ok());
    match EnvFilter::try_new(&text) {
        Ok(filter) => Ok((filter, text)),
        Err(_) => Err(LoggerError::InvalidFilter {
            directive: text,
            source_name,
        }),
    }
}

fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn as_error(e: impl std::fmt::Display) -> LoggerError {
    let s = e.to_string();
    if s.contains("SetGlobalDefaultError") || s.contains("global default") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::Install(s)
    }
}

fn init_with<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(as_error)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn mk_journald(filter: EnvFilter) -> Result<(), LoggerError> {
    let journald = tracing_journald::layer()
        .map_err(|e| LoggerError::Install(format!("journald socket: {e}")))?
        .with_syslog_identifier("live-tail".to_string());
    let subscriber = tracing_subscriber::registry().with(filter).with(journald);
    init_with(subscriber)
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn mk_journald(_filter: EnvFilter) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldUnavailable)
}
