use async_trait::async_trait;
use tail_model::{ExecutionDetail, ExecutionId, ExecutionSummary, TaskId};

use crate::error::ApiError;

/// Request/response side of the task scheduler.
///
/// The live-tail flow only needs [`running_executions`](Self::running_executions);
/// the other calls back the static detail view and manual triggering.
/// Implemented over HTTP by [`HttpExecutionApi`](crate::HttpExecutionApi) and by
/// scripted fakes in tests.
#[async_trait]
pub trait ExecutionApi: Send + Sync + 'static {
    /// Executions of `task` that are running right now, possibly none.
    async fn running_executions(&self, task: &TaskId) -> Result<Vec<ExecutionSummary>, ApiError>;

    /// Full record of one execution.
    async fn execution_detail(&self, id: &ExecutionId) -> Result<ExecutionDetail, ApiError>;

    /// Ask the scheduler to run `task` now.
    ///
    /// `csrf` is sent as the `_csrf` form field when the server session enforces one.
    async fn execute_task(&self, task: &TaskId, csrf: Option<&str>) -> Result<(), ApiError>;
}
