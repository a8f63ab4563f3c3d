use serde::{Deserialize, Serialize};

use crate::{DurationMs, ExecutionId, ExecutionStatus, TaskId};

/// Minimal projection returned by the running-executions query.
///
/// Only the identifier is required; everything else the backend sends is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
}

impl ExecutionSummary {
    pub fn new(id: impl Into<ExecutionId>) -> Self {
        Self {
            id: id.into(),
            status: Some(ExecutionStatus::Running),
        }
    }
}

/// Task definition reference embedded in an execution record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub task_id: TaskId,
}

/// User reference embedded in an execution record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub username: String,
}

/// Full, read-only record of one execution.
///
/// Fetched once for the static detail view; it never streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDetail {
    pub id: ExecutionId,
    pub task: TaskRef,
    pub status: ExecutionStatus,
    /// Start time as sent by the backend (ISO-8601 local date-time).
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub execution_time_ms: Option<DurationMs>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// How the run was started: `SCHEDULED`, `MANUAL` or `DEPENDENCY`.
    #[serde(default = "default_triggered_by")]
    pub triggered_by: String,
    #[serde(default)]
    pub triggered_by_user: Option<UserRef>,
}

fn default_triggered_by() -> String {
    "SCHEDULED".to_string()
}
