use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use tail_model::{ExecutionDetail, ExecutionId, ExecutionSummary, TaskId};

use crate::{api::ExecutionApi, error::ApiError};

const CSRF_FIELD: &str = "_csrf";

/// [`ExecutionApi`] over the scheduler's HTTP endpoints.
///
/// Routes:
/// - GET  {base}/api/tasks/{taskId}/running-executions
/// - GET  {base}/execution/{executionId}
/// - POST {base}/execute/{taskId}
#[derive(Clone, Debug)]
pub struct HttpExecutionApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutionApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidBaseUrl(base_url));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, segment: &str, tail: &str) -> String {
        format!(
            "{}{}{}{}",
            self.base_url,
            path,
            urlencoding::encode(segment),
            tail
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ApiError> {
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("failed to parse response: {}, body: {}", e, body))
        })
    }
}

#[async_trait]
impl ExecutionApi for HttpExecutionApi {
    #[instrument(level = "trace", skip(self), fields(task_id = %task))]
    async fn running_executions(&self, task: &TaskId) -> Result<Vec<ExecutionSummary>, ApiError> {
        let url = self.url("/api/tasks/", task.as_str(), "/running-executions");
        let list: Vec<ExecutionSummary> = self.get_json(url).await?;

        trace!(count = list.len(), "running executions fetched");
        Ok(list)
    }

    #[instrument(level = "trace", skip(self), fields(execution_id = %id))]
    async fn execution_detail(&self, id: &ExecutionId) -> Result<ExecutionDetail, ApiError> {
        let url = self.url("/execution/", id.as_str(), "");
        self.get_json(url).await
    }

    #[instrument(level = "debug", skip(self, csrf), fields(task_id = %task))]
    async fn execute_task(&self, task: &TaskId, csrf: Option<&str>) -> Result<(), ApiError> {
        let url = self.url("/execute/", task.as_str(), "");
        let form: Vec<(&str, &str)> = csrf.map(|t| vec![(CSRF_FIELD, t)]).unwrap_or_default();

        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        debug!(status = status.as_u16(), "manual execution requested");
        Ok(())
    }
}
