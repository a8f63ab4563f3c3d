use std::{
    io::{self, Write},
    sync::Mutex,
};

use crate::sync::lock;

/// Shown while a session is still looking for a running execution.
pub const PLACEHOLDER: &str = "Waiting for execution to start...";

/// Destination of rendered output lines.
pub trait OutputSink: Send + Sync + 'static {
    /// Replace everything shown with `text`.
    fn reset(&self, text: &str);
    /// Remove everything shown.
    fn clear(&self);
    /// Add one line at the end.
    fn append(&self, line: &str);
}

/// Keeps lines in memory; what the session "displays" in tests.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    pub fn contents(&self) -> String {
        lock(&self.lines).join("\n")
    }
}

impl OutputSink for BufferSink {
    fn reset(&self, text: &str) {
        let mut lines = lock(&self.lines);
        lines.clear();
        lines.push(text.to_string());
    }

    fn clear(&self) {
        lock(&self.lines).clear();
    }

    fn append(&self, line: &str) {
        lock(&self.lines).push(line.to_string());
    }
}

/// Writes lines to standard output.
///
/// A terminal cannot take lines back, so `clear` is a no-op and `reset`
/// simply prints its text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn reset(&self, text: &str) {
        self.append(text);
    }

    fn clear(&self) {}

    fn append(&self, line: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}
