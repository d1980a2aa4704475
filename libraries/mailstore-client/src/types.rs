//! Types for MailStore API responses.
//!
//! Every API call answers with the same JSON envelope:
//!
//! ```json
//! {
//!   "error": null,
//!   "token": "a1b2...",
//!   "statusVersion": 3,
//!   "statusCode": "running",
//!   "percentProgress": 40,
//!   "statusText": "Compacting...",
//!   "result": null,
//!   "logOutput": null
//! }
//! ```
//!
//! [`TaskResponse`] separates envelopes that can be tracked through a status
//! token from those that are already final.

use crate::error::{MailStoreError, Result};
use crate::lro::has_token;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

// =============================================================================
// Status Codes
// =============================================================================

/// The `statusCode` of a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Task is still executing
    Running,
    /// Task finished successfully (`succeeded`, also accepted as `completed`)
    Succeeded,
    /// Task finished with an error
    Failed,
    /// Task was cancelled (`cancelled`, also accepted as `canceled`)
    Cancelled,
    /// Anything else the server sent, including an empty or missing code
    Unknown(String),
}

impl StatusCode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" => StatusCode::Running,
            "succeeded" | "completed" => StatusCode::Succeeded,
            "failed" => StatusCode::Failed,
            "cancelled" | "canceled" => StatusCode::Cancelled,
            other => StatusCode::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StatusCode::Running => "running",
            StatusCode::Succeeded => "succeeded",
            StatusCode::Failed => "failed",
            StatusCode::Cancelled => "cancelled",
            StatusCode::Unknown(raw) => raw,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, StatusCode::Running)
    }

    /// Known, non-running status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusCode::Succeeded | StatusCode::Failed | StatusCode::Cancelled
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn status_code_of(body: &Value) -> Option<StatusCode> {
    match body.get("statusCode") {
        Some(Value::String(s)) => Some(StatusCode::parse(s)),
        Some(Value::Null) | None => None,
        Some(other) => Some(StatusCode::Unknown(other.to_string())),
    }
}

fn non_null<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key).filter(|v| !v.is_null())
}

// =============================================================================
// Tracked Tasks
// =============================================================================

/// A response carrying a status token and a status version.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTask {
    token: String,
    body: Value,
}

impl TrackedTask {
    fn new(body: Value) -> Self {
        let token = match body.get("token") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Self { token, body }
    }

    /// The opaque status token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Status code, `Unknown("")` if the server omitted it.
    pub fn status_code(&self) -> StatusCode {
        status_code_of(&self.body).unwrap_or_else(|| StatusCode::Unknown(String::new()))
    }

    pub fn is_running(&self) -> bool {
        self.status_code().is_running()
    }

    /// Raw `statusVersion` value.
    pub fn status_version(&self) -> &Value {
        self.body.get("statusVersion").unwrap_or(&Value::Null)
    }

    /// `statusVersion` as an integer, if it is one (or a string holding one).
    pub fn status_version_number(&self) -> Option<i64> {
        match self.status_version() {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// `statusVersion` as sent back in `lastKnownStatusVersion`.
    pub fn status_version_string(&self) -> String {
        match self.status_version() {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn percent_progress(&self) -> Option<f64> {
        non_null(&self.body, "percentProgress").and_then(Value::as_f64)
    }

    pub fn status_text(&self) -> Option<&str> {
        non_null(&self.body, "statusText").and_then(Value::as_str)
    }

    /// The full response envelope.
    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

// =============================================================================
// Task Responses
// =============================================================================

/// A decoded API response.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResponse {
    /// Synchronous result, nothing to track
    Immediate(Value),
    /// Asynchronous task identified by a status token
    Tracked(TrackedTask),
}

impl TaskResponse {
    /// Classify a decoded response envelope.
    pub fn from_json(body: Value) -> Self {
        if has_token(&body) {
            TaskResponse::Tracked(TrackedTask::new(body))
        } else {
            TaskResponse::Immediate(body)
        }
    }

    pub fn is_tracked(&self) -> bool {
        matches!(self, TaskResponse::Tracked(_))
    }

    pub fn tracked(&self) -> Option<&TrackedTask> {
        match self {
            TaskResponse::Tracked(task) => Some(task),
            TaskResponse::Immediate(_) => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.tracked().map(TrackedTask::token)
    }

    /// The full response envelope.
    pub fn json(&self) -> &Value {
        match self {
            TaskResponse::Immediate(body) => body,
            TaskResponse::Tracked(task) => task.body(),
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            TaskResponse::Immediate(body) => body,
            TaskResponse::Tracked(task) => task.into_body(),
        }
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        status_code_of(self.json())
    }

    /// The operation result, if the server sent one.
    pub fn result(&self) -> Option<&Value> {
        non_null(self.json(), "result")
    }

    /// The error object of a failed operation.
    pub fn error(&self) -> Option<&Value> {
        non_null(self.json(), "error")
    }

    pub fn log_output(&self) -> Option<&str> {
        non_null(self.json(), "logOutput").and_then(Value::as_str)
    }

    /// Deserialize the `result` field.
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<T> {
        let result = self.result().cloned().unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| MailStoreError::Parse(format!("Failed to decode result: {}", e)))
    }

    /// Turn a failed envelope into [`MailStoreError::TaskFailed`].
    pub fn into_result(self) -> Result<Self> {
        let failed = self.status_code() == Some(StatusCode::Failed);
        match self.error() {
            Some(error) => Err(MailStoreError::TaskFailed {
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
                details: non_null(error, "details").cloned(),
            }),
            None if failed => Err(MailStoreError::TaskFailed {
                message: non_null(self.json(), "statusText")
                    .and_then(Value::as_str)
                    .unwrap_or("task failed")
                    .to_string(),
                details: None,
            }),
            None => Ok(self),
        }
    }
}

impl From<Value> for TaskResponse {
    fn from(body: Value) -> Self {
        TaskResponse::from_json(body)
    }
}
