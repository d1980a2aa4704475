//! Generic MailStore API client.
//!
//! [`ApiClient`] owns the configuration and the transport and makes the one
//! decision every operation shares: return a response as it is, or follow its
//! status token until the task is done.

use crate::config::{ClientConfig, PollPolicy};
use crate::error::{MailStoreError, Result};
use crate::lro::{self, PollContext, ProgressCallback};
use crate::transport::{ApiRequest, Arguments, HttpTransport, Transport};
use crate::types::{TaskResponse, TrackedTask};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Per-call overrides of the client configuration.
///
/// Unset fields fall back to the values in [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub auto_handle_token: Option<bool>,
    pub wait_time: Option<Duration>,
    pub progress: Option<ProgressCallback>,
    pub poll_policy: Option<PollPolicy>,
    /// Stops polling when cancelled. The remote task keeps running.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_handle_token(mut self, auto: bool) -> Self {
        self.auto_handle_token = Some(auto);
        self
    }

    pub fn wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = Some(wait_time);
        self
    }

    pub fn progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = Some(policy);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Client for the MailStore HTTP API.
///
/// Cheap to clone; clones share configuration and transport.
///
/// # Example
///
/// ```ignore
/// use mailstore_client::{ApiClient, Arguments, CallOptions, ClientConfig};
///
/// let client = ApiClient::new(ClientConfig::new("archive.local", "admin", "secret"))?;
/// let stores = client
///     .invoke("GetStores", Arguments::new(), &CallOptions::new())
///     .await?;
/// println!("{}", stores.json());
/// ```
pub struct ApiClient<T = HttpTransport> {
    config: Arc<ClientConfig>,
    transport: Arc<T>,
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl ApiClient<HttpTransport> {
    /// Create a client talking HTTP(S) to the configured server.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        info!(
            url = %transport.base_url(),
            user = %config.username,
            "Created MailStore API client"
        );
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> ApiClient<T> {
    /// Create a client on top of an arbitrary transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Invoke the API operation `method`.
    ///
    /// A response without status token is returned as it is. A tracked
    /// response is polled to completion when token handling is enabled
    /// (per call, else per client), otherwise returned with its token intact.
    pub async fn invoke(
        &self,
        method: &str,
        arguments: Arguments,
        options: &CallOptions,
    ) -> Result<TaskResponse> {
        info!(method = %method, "Invoking API method");
        let value = self
            .transport
            .invoke(&ApiRequest::invoke(method, arguments))
            .await?;

        let response = TaskResponse::from_json(value);
        let response = self.dispatch(response, options).await?;
        debug!(method = %method, response = %response.json(), "Returning data to caller");
        Ok(response)
    }

    async fn dispatch(
        &self,
        response: TaskResponse,
        options: &CallOptions,
    ) -> Result<TaskResponse> {
        let task = match response {
            TaskResponse::Tracked(task) => task,
            immediate => {
                debug!("No status token detected");
                return Ok(immediate);
            }
        };

        let auto = options
            .auto_handle_token
            .unwrap_or(self.config.auto_handle_token);
        info!(
            token = %task.token(),
            status_version = %task.status_version_string(),
            auto_handle = auto,
            "Status token detected"
        );

        if auto {
            self.drive(task, options).await.map(TaskResponse::Tracked)
        } else {
            Ok(TaskResponse::Tracked(task))
        }
    }

    /// Poll a tracked response until it is no longer running.
    pub async fn handle_token(
        &self,
        response: TaskResponse,
        options: &CallOptions,
    ) -> Result<TaskResponse> {
        match response {
            TaskResponse::Tracked(task) => {
                self.drive(task, options).await.map(TaskResponse::Tracked)
            }
            TaskResponse::Immediate(_) => Err(MailStoreError::no_token("cannot handle token")),
        }
    }

    async fn drive(&self, task: TrackedTask, options: &CallOptions) -> Result<TrackedTask> {
        let ctx = PollContext {
            wait_time: options.wait_time.unwrap_or(self.config.wait_time),
            policy: self.policy(options),
            progress: options.progress.as_ref().or(self.config.progress.as_ref()),
            cancel: options.cancel.as_ref(),
        };
        lro::drive_to_completion(self.transport.as_ref(), task, ctx).await
    }

    fn policy<'a>(&'a self, options: &'a CallOptions) -> &'a PollPolicy {
        options
            .poll_policy
            .as_ref()
            .unwrap_or(&self.config.poll_policy)
    }

    /// Fetch the next status of a tracked response with one `get-status` call.
    ///
    /// `wait_time` falls back to `options.wait_time`, then to the configured
    /// wait time. The version check follows `options.poll_policy` when set.
    /// The result is never polled further, whatever its status.
    pub async fn get_status(
        &self,
        response: &TaskResponse,
        wait_time: Option<Duration>,
        options: &CallOptions,
    ) -> Result<TaskResponse> {
        let task = response
            .tracked()
            .ok_or_else(|| MailStoreError::no_token("cannot get status"))?;
        let wait_time = wait_time
            .or(options.wait_time)
            .unwrap_or(self.config.wait_time);
        lro::refresh_status(self.transport.as_ref(), task, wait_time, self.policy(options))
            .await
            .map(TaskResponse::Tracked)
    }

    /// Ask the server to cancel the task behind a tracked response.
    pub async fn cancel_async(&self, response: &TaskResponse) -> Result<TaskResponse> {
        let task = response
            .tracked()
            .ok_or_else(|| MailStoreError::no_token("cannot cancel"))?;
        lro::request_cancel(self.transport.as_ref(), task).await
    }
}
