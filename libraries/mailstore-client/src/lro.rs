//! Status token handling for long running tasks.
//!
//! Some API operations answer before they are done. Their response carries a
//! `token` and a `statusVersion`; the task is then followed through the
//! `get-status` call, which the server holds open until the status version
//! changes or the requested wait time elapses.
//!
//! ```text
//!   invoke ──► has_token? ──no──► Immediate
//!                 │yes
//!                 ▼
//!   progress(initial) ──► running? ──no──► done
//!                            │yes   ▲
//!                            ▼      │
//!                      get-status ──┴─► progress(refreshed)
//! ```

use crate::config::PollPolicy;
use crate::error::{MailStoreError, Result};
use crate::transport::{ApiRequest, Transport};
use crate::types::{StatusCode, TaskResponse, TrackedTask};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Whether `response` describes a task that can be followed by its token.
///
/// True iff `token` is present and not null and `statusVersion` is present.
pub fn has_token(response: &Value) -> bool {
    let token = response.get("token").is_some_and(|t| !t.is_null());
    token && response.get("statusVersion").is_some()
}

/// Receives every observed state of a tracked task, in observation order.
#[derive(Clone)]
pub struct ProgressCallback(Arc<dyn Fn(&TrackedTask) + Send + Sync>);

impl ProgressCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&TrackedTask) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Forward every observed state into a channel.
    ///
    /// States are dropped silently once the receiver is gone.
    pub fn channel(sender: mpsc::UnboundedSender<TrackedTask>) -> Self {
        Self::new(move |task| {
            let _ = sender.send(task.clone());
        })
    }

    pub fn call(&self, task: &TrackedTask) {
        (self.0)(task);
    }
}

impl fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressCallback")
    }
}

/// Everything one poll loop needs besides the transport.
#[derive(Debug, Clone, Copy)]
pub struct PollContext<'a> {
    /// Server-side long-poll budget per refresh
    pub wait_time: Duration,
    pub policy: &'a PollPolicy,
    pub progress: Option<&'a ProgressCallback>,
    pub cancel: Option<&'a CancellationToken>,
}

impl PollContext<'_> {
    fn report(&self, task: &TrackedTask) {
        if let Some(progress) = self.progress {
            debug!(
                token = %task.token(),
                status_version = %task.status_version_string(),
                status = %task.status_code(),
                "Executing progress callback"
            );
            progress.call(task);
        }
    }
}

/// Fetch the next status of `task` with one `get-status` call.
///
/// The reply must still carry a token and must advance the status version
/// (see [`PollPolicy::allow_unchanged_version`]).
pub async fn refresh_status<T: Transport + ?Sized>(
    transport: &T,
    task: &TrackedTask,
    wait_time: Duration,
    policy: &PollPolicy,
) -> Result<TrackedTask> {
    info!(token = %task.token(), "Refreshing status");

    let request = ApiRequest::get_status(task.token(), wait_time, &task.status_version_string());
    let value = transport.invoke(&request).await?;

    let next = match TaskResponse::from_json(value) {
        TaskResponse::Tracked(next) => next,
        TaskResponse::Immediate(_) => {
            return Err(MailStoreError::anomaly(format!(
                "status refresh of task {} returned no token",
                task.token()
            )))
        }
    };

    check_version(task, &next, policy)?;
    debug!(token = %next.token(), body = %next.body(), "Status refreshed");
    Ok(next)
}

fn check_version(previous: &TrackedTask, next: &TrackedTask, policy: &PollPolicy) -> Result<()> {
    let numeric = |task: &TrackedTask| {
        task.status_version_number().ok_or_else(|| {
            MailStoreError::anomaly(format!(
                "task {} has non-numeric status version {}",
                task.token(),
                task.status_version()
            ))
        })
    };
    let before = numeric(previous)?;
    let after = numeric(next)?;

    if after > before || (after == before && policy.allow_unchanged_version) {
        Ok(())
    } else {
        Err(MailStoreError::anomaly(format!(
            "status version of task {} went from {} to {}",
            next.token(),
            before,
            after
        )))
    }
}

/// Ask the server to cancel `task`. The reply is returned without polling.
pub async fn request_cancel<T: Transport + ?Sized>(
    transport: &T,
    task: &TrackedTask,
) -> Result<TaskResponse> {
    info!(token = %task.token(), "Cancelling task");
    let value = transport
        .invoke(&ApiRequest::cancel_async(task.token()))
        .await?;
    Ok(TaskResponse::from_json(value))
}

/// Poll `task` until it leaves the `running` state.
///
/// The progress callback sees the initial state and every refreshed state,
/// the terminal one included. An unknown status code, a deadline, a
/// cancellation or a non-transient refresh error ends the loop with an error.
pub async fn drive_to_completion<T: Transport + ?Sized>(
    transport: &T,
    task: TrackedTask,
    ctx: PollContext<'_>,
) -> Result<TrackedTask> {
    let started = Instant::now();
    let poller = Poller {
        transport,
        ctx,
        started,
        deadline: ctx.policy.deadline.and_then(|d| started.checked_add(d)),
    };

    let mut task = task;
    ctx.report(&task);

    loop {
        match task.status_code() {
            StatusCode::Running => {}
            StatusCode::Unknown(raw) => {
                return Err(MailStoreError::anomaly(format!(
                    "task {} reported unknown status code {:?}",
                    task.token(),
                    raw
                )))
            }
            status => {
                info!(token = %task.token(), status = %status, "Task finished");
                return Ok(task);
            }
        }

        task = poller.refresh(&task).await?;
        ctx.report(&task);
    }
}

struct Poller<'a, T: ?Sized> {
    transport: &'a T,
    ctx: PollContext<'a>,
    started: Instant,
    deadline: Option<Instant>,
}

impl<T: Transport + ?Sized> Poller<'_, T> {
    /// One refresh, retried on transient failures.
    async fn refresh(&self, task: &TrackedTask) -> Result<TrackedTask> {
        let policy = self.ctx.policy;
        let mut attempt = 0;

        loop {
            let wait_time = self.wait_budget(task)?;
            let refreshed = self
                .guard(
                    task,
                    refresh_status(self.transport, task, wait_time, policy),
                )
                .await?;

            match refreshed {
                Ok(next) => return Ok(next),
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    let backoff = policy.backoff(attempt);
                    attempt += 1;
                    warn!(
                        token = %task.token(),
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Status refresh failed, retrying"
                    );
                    self.guard(task, tokio::time::sleep(backoff)).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait time for the next refresh, clamped to what is left of the deadline.
    fn wait_budget(&self, task: &TrackedTask) -> Result<Duration> {
        match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    Err(self.deadline_exceeded(task))
                } else {
                    Ok(self.ctx.wait_time.min(remaining))
                }
            }
            None => Ok(self.ctx.wait_time),
        }
    }

    /// Run `fut` unless cancellation or the deadline comes first.
    async fn guard<F: Future>(&self, task: &TrackedTask, fut: F) -> Result<F::Output> {
        let cancelled = async {
            match self.ctx.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => {
                info!(token = %task.token(), "Polling cancelled");
                Err(MailStoreError::PollCancelled {
                    token: task.token().to_string(),
                    status_version: task.status_version_string(),
                })
            }
            () = expired => Err(self.deadline_exceeded(task)),
            out = fut => Ok(out),
        }
    }

    fn deadline_exceeded(&self, task: &TrackedTask) -> MailStoreError {
        let elapsed = self.started.elapsed();
        warn!(
            token = %task.token(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Poll deadline exceeded"
        );
        MailStoreError::DeadlineExceeded {
            token: task.token().to_string(),
            elapsed,
        }
    }
}
