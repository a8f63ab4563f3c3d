use std::str::FromStr;

use crate::logger::{error::LoggerError, format::LoggerFormat};

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `tail_bus=debug,info`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl LoggerConfig {
    /// Build a config from the CLI-facing strings, keeping the remaining defaults.
    pub fn from_parts(format: &str, level: &str) -> Result<Self, LoggerError> {
        Ok(Self {
            format: LoggerFormat::from_str(format)?,
            level: level.to_string(),
            ..Default::default()
        })
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || atty::is(atty::Stream::Stderr);
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_text_info() {
        let cfg = LoggerConfig::default();
        assert_eq!(cfg.format, LoggerFormat::Text);
        assert_eq!(cfg.level, "info");
        assert!(cfg.with_targets);
    }

    #[test]
    fn from_parts_parses_format() {
        let cfg = LoggerConfig::from_parts("JSON", "debug").unwrap();
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert_eq!(cfg.level, "debug");

        assert!(matches!(
            LoggerConfig::from_parts("xml", "info"),
            Err(LoggerError::InvalidFormat(_))
        ));
    }
}
