use time::{OffsetDateTime, UtcOffset, macros::format_description};

use tail_model::OutputEvent;

/// Turns output events into display lines: `[HH:MM:SS] <marker><content>`.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    offset: UtcOffset,
}

impl Renderer {
    /// Render in the local zone, falling back to UTC when it cannot be determined.
    pub fn local() -> Self {
        Self {
            offset: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        }
    }

    pub fn with_offset(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn render(&self, event: &OutputEvent) -> String {
        format!(
            "[{}] {}{}",
            self.clock(event.timestamp_ms),
            event.kind.marker(),
            event.content
        )
    }

    fn clock(&self, timestamp_ms: i64) -> String {
        let nanos = i128::from(timestamp_ms) * 1_000_000;
        let Ok(at) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
            return "--:--:--".to_string();
        };
        at.to_offset(self.offset)
            .format(format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_else(|_| "--:--:--".to_string())
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::local()
    }
}

#[cfg(test)]
mod tests {
    use tail_model::OutputKind;
    use time::macros::offset;

    use super::*;

    // 2024-01-01T12:00:05Z
    const NOON: i64 = 1_704_110_405_000;

    #[test]
    fn markers_follow_event_kind() {
        let r = Renderer::with_offset(UtcOffset::UTC);

        let cases = [
            (OutputKind::Start, "[12:00:05] 🚀 Starting"),
            (OutputKind::Stdout, "[12:00:05] Starting"),
            (OutputKind::Stderr, "[12:00:05] ❌ Starting"),
            (OutputKind::Error, "[12:00:05] ⚠️ Starting"),
            (OutputKind::End, "[12:00:05] ✅ Starting"),
        ];
        for (kind, want) in cases {
            assert_eq!(r.render(&OutputEvent::new(kind, "Starting", NOON)), want);
        }
    }

    #[test]
    fn clock_uses_configured_offset() {
        let r = Renderer::with_offset(offset!(+2));
        let line = r.render(&OutputEvent::new(OutputKind::Stdout, "x", NOON + 999));
        assert_eq!(line, "[14:00:05] x");
    }

    #[test]
    fn unrepresentable_timestamp_still_renders() {
        let r = Renderer::with_offset(UtcOffset::UTC);
        let line = r.render(&OutputEvent::new(OutputKind::End, "done", i64::MAX));
        assert_eq!(line, "[--:--:--] ✅ done");
    }
}
