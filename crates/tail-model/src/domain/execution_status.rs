use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one execution as reported by the execution API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    /// Execution is in progress.
    Running,
    /// Execution finished with a zero exit code.
    Success,
    /// Execution finished with an error.
    Failed,
    /// Execution exceeded its time limit.
    Timeout,
    /// Execution was cancelled.
    Cancelled,
    /// Any status this client does not know about.
    Other,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Timeout => "TIMEOUT",
            ExecutionStatus::Cancelled => "CANCELLED",
            ExecutionStatus::Other => "OTHER",
        }
    }

    /// Badge class used when displaying the status: `success`, `warning` or `error`.
    pub fn badge(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Running => "warning",
            _ => "error",
        }
    }
}

impl From<String> for ExecutionStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "RUNNING" => ExecutionStatus::Running,
            "SUCCESS" => ExecutionStatus::Success,
            "FAILED" => ExecutionStatus::Failed,
            "TIMEOUT" => ExecutionStatus::Timeout,
            "CANCELLED" => ExecutionStatus::Cancelled,
            _ => ExecutionStatus::Other,
        }
    }
}

impl From<ExecutionStatus> for String {
    fn from(status: ExecutionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badges() {
        assert_eq!(ExecutionStatus::Success.badge(), "success");
        assert_eq!(ExecutionStatus::Running.badge(), "warning");
        assert_eq!(ExecutionStatus::Timeout.badge(), "error");
    }

    #[test]
    fn unknown_status_maps_to_other() {
        let status: ExecutionStatus = serde_json::from_str(r#""PAUSED""#).unwrap();
        assert_eq!(status, ExecutionStatus::Other);

        let status: ExecutionStatus = serde_json::from_str(r#""RUNNING""#).unwrap();
        assert_eq!(status, ExecutionStatus::Running);
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""RUNNING""#);
    }
}
