use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ModelError;
use crate::domain::wire_time::deserialize_millis;

/// Kind of one output event of a running execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputKind {
    /// Execution started.
    Start,
    /// One line of standard output.
    Stdout,
    /// One line of error output.
    Stderr,
    /// Failure notice (timeout, spawn failure, ...).
    Error,
    /// Execution finished.
    End,
    /// Unknown kind; rendered as a plain line.
    Other,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Start => "START",
            OutputKind::Stdout => "STDOUT",
            OutputKind::Stderr => "STDERR",
            OutputKind::Error => "ERROR",
            OutputKind::End => "END",
            OutputKind::Other => "OTHER",
        }
    }

    /// Prefix written between the timestamp and the content.
    pub fn marker(&self) -> &'static str {
        match self {
            OutputKind::Start => "🚀 ",
            OutputKind::Stderr => "❌ ",
            OutputKind::Error => "⚠️ ",
            OutputKind::End => "✅ ",
            OutputKind::Stdout | OutputKind::Other => "",
        }
    }
}

impl From<String> for OutputKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "START" => OutputKind::Start,
            "STDOUT" => OutputKind::Stdout,
            "STDERR" => OutputKind::Stderr,
            "ERROR" => OutputKind::Error,
            "END" => OutputKind::End,
            _ => OutputKind::Other,
        }
    }
}

impl From<OutputKind> for String {
    fn from(kind: OutputKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped record on an execution topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    #[serde(rename = "type")]
    pub kind: OutputKind,
    #[serde(default)]
    pub content: String,
    /// Milliseconds since the unix epoch.
    #[serde(rename = "timestamp", deserialize_with = "deserialize_millis")]
    pub timestamp_ms: i64,
}

impl OutputEvent {
    pub fn new(kind: OutputKind, content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp_ms,
        }
    }

    /// Decode a message body received on an execution topic.
    pub fn decode(body: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Encode as a message body, the way the backend publishes it.
    pub fn encode(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_epoch_millis() {
        let ev = OutputEvent::decode(r#"{"type":"STDOUT","content":"line1","timestamp":1000}"#)
            .unwrap();
        assert_eq!(ev, OutputEvent::new(OutputKind::Stdout, "line1", 1000));
    }

    #[test]
    fn decode_datetime_string() {
        let ev = OutputEvent::decode(
            r#"{"type":"END","content":"done","timestamp":"1970-01-01T00:00:02Z"}"#,
        )
        .unwrap();
        assert_eq!(ev.kind, OutputKind::End);
        assert_eq!(ev.timestamp_ms, 2_000);
    }

    #[test]
    fn unknown_kind_is_other() {
        let ev = OutputEvent::decode(r#"{"type":"PROGRESS","content":"50%","timestamp":0}"#)
            .unwrap();
        assert_eq!(ev.kind, OutputKind::Other);
        assert_eq!(ev.kind.marker(), "");
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(matches!(
            OutputEvent::decode("not json"),
            Err(ModelError::InvalidPayload(_))
        ));
        assert!(OutputEvent::decode(r#"{"content":"no type","timestamp":0}"#).is_err());
    }

    #[test]
    fn markers_follow_kind() {
        assert_eq!(OutputKind::Start.marker(), "🚀 ");
        assert_eq!(OutputKind::Stdout.marker(), "");
        assert_eq!(OutputKind::Stderr.marker(), "❌ ");
        assert_eq!(OutputKind::Error.marker(), "⚠️ ");
        assert_eq!(OutputKind::End.marker(), "✅ ");
    }
}
