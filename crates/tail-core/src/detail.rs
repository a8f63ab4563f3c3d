//! Plain-text rendering of a finished (or running) execution record.

use std::fmt::Write;

use time::{UtcOffset, macros::format_description};

use tail_model::{DurationMs, ExecutionDetail, parse_datetime};

const NOT_AVAILABLE: &str = "N/A";

/// `Nms` below one second, `N.NNs` from there on.
pub fn format_duration(ms: DurationMs) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else {
        format!("{:.2}s", ms as f64 / 1_000.0)
    }
}

/// Backend date-time shown in `offset`; the raw text when it does not parse.
pub fn format_datetime(raw: &str, offset: UtcOffset) -> String {
    let Ok(at) = parse_datetime(raw) else {
        return raw.to_string();
    };
    at.to_offset(offset)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| raw.to_string())
}

/// Render the detail view of one execution.
pub fn render_detail(detail: &ExecutionDetail, offset: UtcOffset) -> String {
    let or_na = |v: Option<String>| v.unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let mut out = String::new();
    let _ = writeln!(out, "Execution:    {}", detail.id);
    let _ = writeln!(out, "Task ID:      {}", detail.task.task_id);
    let _ = writeln!(out, "Status:       {} [{}]", detail.status, detail.status.badge());
    let _ = writeln!(
        out,
        "Start Time:   {}",
        or_na(detail.start_time.as_deref().map(|t| format_datetime(t, offset)))
    );
    let _ = writeln!(
        out,
        "End Time:     {}",
        or_na(detail.end_time.as_deref().map(|t| format_datetime(t, offset)))
    );
    let _ = writeln!(out, "Duration:     {}", or_na(detail.execution_time_ms.map(format_duration)));
    let _ = writeln!(out, "Exit Code:    {}", or_na(detail.exit_code.map(|c| c.to_string())));
    match &detail.triggered_by_user {
        Some(user) => {
            let _ = writeln!(out, "Triggered By: {} ({})", detail.triggered_by, user.username);
        }
        None => {
            let _ = writeln!(out, "Triggered By: {}", detail.triggered_by);
        }
    }

    if let Some(msg) = detail.error_message.as_deref().filter(|m| !m.is_empty()) {
        let _ = write!(out, "\nError Message:\n{msg}\n");
    }

    let stdout = detail
        .stdout
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("No output");
    let _ = write!(out, "\nStandard Output:\n{stdout}\n");

    if let Some(stderr) = detail.stderr.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(out, "\nError Output:\n{stderr}\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use tail_model::{ExecutionStatus, TaskRef, UserRef};

    use super::*;

    fn detail() -> ExecutionDetail {
        ExecutionDetail {
            id: "42".into(),
            task: TaskRef {
                task_id: "build-task".into(),
            },
            status: ExecutionStatus::Success,
            start_time: Some("2024-01-01T12:00:00Z".into()),
            end_time: None,
            execution_time_ms: Some(1_534),
            exit_code: Some(0),
            stdout: None,
            stderr: None,
            error_message: None,
            triggered_by: "MANUAL".into(),
            triggered_by_user: Some(UserRef {
                username: "admin".into(),
            }),
        }
    }

    #[test]
    fn duration_switches_units_at_one_second() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(999), "999ms");
        assert_eq!(format_duration(1_000), "1.00s");
        assert_eq!(format_duration(12_346), "12.35s");
    }

    #[test]
    fn unparsable_datetime_is_shown_raw() {
        assert_eq!(format_datetime("yesterday", UtcOffset::UTC), "yesterday");
        assert_eq!(
            format_datetime("2024-01-01T12:00:00Z", UtcOffset::UTC),
            "2024-01-01 12:00:00"
        );
    }

    #[test]
    fn renders_summary_fields() {
        let text = render_detail(&detail(), UtcOffset::UTC);

        assert!(text.contains("Task ID:      build-task"));
        assert!(text.contains("Status:       SUCCESS [success]"));
        assert!(text.contains("Start Time:   2024-01-01 12:00:00"));
        assert!(text.contains("End Time:     N/A"));
        assert!(text.contains("Duration:     1.53s"));
        assert!(text.contains("Exit Code:    0"));
        assert!(text.contains("Triggered By: MANUAL (admin)"));
        assert!(text.contains("Standard Output:\nNo output"));
        assert!(!text.contains("Error Output"));
        assert!(!text.contains("Error Message"));
    }

    #[test]
    fn failure_shows_error_sections() {
        let mut d = detail();
        d.status = ExecutionStatus::Failed;
        d.exit_code = None;
        d.stdout = Some("partial".into());
        d.stderr = Some("boom".into());
        d.error_message = Some("exited with 2".into());
        d.triggered_by_user = None;

        let text = render_detail(&d, UtcOffset::UTC);
        assert!(text.contains("Status:       FAILED [error]"));
        assert!(text.contains("Exit Code:    N/A"));
        assert!(text.contains("Triggered By: MANUAL\n"));
        assert!(text.contains("Error Message:\nexited with 2"));
        assert!(text.contains("Standard Output:\npartial"));
        assert!(text.contains("Error Output:\nboom"));
    }
}
