use std::{sync::Arc, time::Duration};

use tracing::{debug, info};

use tail_api::{ExecutionApi, HttpExecutionApi};
use tail_bus::{ConnectionManager, Dialer, EventSubscriber, WsDialer};
use tail_model::{ExecutionDetail, ExecutionId, TaskId};

use crate::{
    config::ClientConfig,
    error::CoreError,
    locator::{ExecutionLocator, LocatorConfig},
    render::Renderer,
    session::ViewerSession,
    sink::OutputSink,
};

/// Process-wide entry point: one API client and one bus connection shared
/// by every session it opens.
#[derive(Clone)]
pub struct LiveTail {
    api: Arc<dyn ExecutionApi>,
    connection: ConnectionManager,
    locator: ExecutionLocator,
    subscriber: EventSubscriber,
    renderer: Renderer,
    csrf_token: Option<String>,
}

impl LiveTail {
    /// Build the HTTP client and the WebSocket dialer described by `cfg`.
    ///
    /// Nothing is dialed until [`connect`](Self::connect).
    pub fn from_config(cfg: &ClientConfig) -> Result<Self, CoreError> {
        cfg.validate()?;

        let api = HttpExecutionApi::new(cfg.base_url.clone(), cfg.request_timeout())?;
        let dialer = WsDialer::new(cfg.bus_url.clone());
        debug!(base_url = %cfg.base_url, bus_url = %cfg.bus_url, "live tail client configured");

        Ok(Self::new(
            Arc::new(api),
            Arc::new(dialer),
            cfg.locator(),
            cfg.reconnect_delay(),
        )
        .with_csrf_token(cfg.csrf_token.clone()))
    }

    /// Assemble from explicit collaborators.
    pub fn new(
        api: Arc<dyn ExecutionApi>,
        dialer: Arc<dyn Dialer>,
        locator: LocatorConfig,
        reconnect_delay: Duration,
    ) -> Self {
        let connection = ConnectionManager::new(dialer, reconnect_delay);
        Self {
            locator: ExecutionLocator::new(Arc::clone(&api), locator),
            subscriber: EventSubscriber::new(connection.clone()),
            api,
            connection,
            renderer: Renderer::local(),
            csrf_token: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_csrf_token(mut self, token: Option<String>) -> Self {
        self.csrf_token = token;
        self
    }

    /// Start the shared bus connection. Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        info!(endpoint = self.connection.endpoint(), "connecting to event bus");
        self.connection.connect();
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// New idle session rendering into `sink`.
    pub fn session(&self, sink: Arc<dyn OutputSink>) -> ViewerSession {
        ViewerSession::new(
            self.locator.clone(),
            self.subscriber.clone(),
            sink,
            self.renderer,
        )
    }

    /// New session already discovering `task`.
    pub fn open_session(&self, task: TaskId, sink: Arc<dyn OutputSink>) -> ViewerSession {
        let session = self.session(sink);
        session.open(task);
        session
    }

    pub async fn execution_detail(&self, id: &ExecutionId) -> Result<ExecutionDetail, CoreError> {
        Ok(self.api.execution_detail(id).await?)
    }

    /// Ask the backend to run `task` now.
    pub async fn execute_task(&self, task: &TaskId) -> Result<(), CoreError> {
        self.api.execute_task(task, self.csrf_token.as_deref()).await?;
        info!(task_id = %task, "manual execution requested");
        Ok(())
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn renderer(&self) -> Renderer {
        self.renderer
    }
}
