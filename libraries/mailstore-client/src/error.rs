//! Error types for the MailStore API client.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to a MailStore server.
#[derive(Error, Debug)]
pub enum MailStoreError {
    /// A token-dependent operation was attempted on a response without a status token
    #[error("No status token found: {context}")]
    NoToken { context: String },

    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),

    /// Server answered with a non-success status code
    #[error("{status} {message} {method} {url} {data}")]
    Http {
        status: u16,
        message: String,
        url: String,
        method: String,
        /// Form-encoded request body, passwords redacted
        data: String,
    },

    /// Failed to decode the server response
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The server broke the status token protocol
    #[error("Protocol anomaly: {0}")]
    ProtocolAnomaly(String),

    /// The overall poll deadline elapsed before the task finished
    #[error("Task {token} did not finish within {elapsed:?}")]
    DeadlineExceeded { token: String, elapsed: Duration },

    /// Polling was cancelled by the caller
    #[error("Polling of task {token} cancelled at status version {status_version}")]
    PollCancelled {
        token: String,
        status_version: String,
    },

    /// The remote task finished with `statusCode = failed`
    #[error("Task failed: {message}")]
    TaskFailed {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid server address
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl MailStoreError {
    /// Create a missing token error
    pub fn no_token(context: impl Into<String>) -> Self {
        Self::NoToken {
            context: context.into(),
        }
    }

    /// Create a protocol anomaly error
    pub fn anomaly(msg: impl Into<String>) -> Self {
        Self::ProtocolAnomaly(msg.into())
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Connection failures, timeouts and gateway-style HTTP statuses count as
    /// transient. Everything else, including every protocol error, does not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ServerUnreachable(_) => true,
            Self::Request(e) => e.is_connect() || e.is_timeout(),
            Self::Http { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }
}

/// Result type for MailStore client operations.
pub type Result<T> = std::result::Result<T, MailStoreError>;
