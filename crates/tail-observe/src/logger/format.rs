use std::{fmt, str::FromStr};

use crate::logger::error::LoggerError;

/// Where and how diagnostics are written. Tail output itself is never affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerFormat {
    /// Human-readable lines on stderr.
    Text,
    /// One JSON object per line on stderr.
    Json,
    /// Native systemd journal fields.
    Journald,
}

impl LoggerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggerFormat::Text => "text",
            LoggerFormat::Json => "json",
            LoggerFormat::Journald => "journald",
        }
    }

    fn journald() -> Result<Self, LoggerError> {
        if cfg!(all(target_os = "linux", feature = "journald")) {
            Ok(LoggerFormat::Journald)
        } else {
            Err(LoggerError::JournaldUnavailable)
        }
    }
}

impl fmt::Display for LoggerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(LoggerFormat::Text),
            "json" => Ok(LoggerFormat::Json),
            "journald" => Self::journald(),
            _ => Err(LoggerError::InvalidFormat(s.trim().to_string())),
        }
    }
}
