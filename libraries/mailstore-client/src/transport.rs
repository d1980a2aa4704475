//! HTTP transport for MailStore API calls.
//!
//! Every call is an authenticated `POST` of form-encoded arguments. Regular
//! operations live under `/api/invoke/<Operation>`, the two status token
//! calls under `/api/get-status` and `/api/cancel-async`.

use crate::config::ClientConfig;
use crate::error::{MailStoreError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

/// Argument keys whose values never appear in logs or errors.
const REDACTED_KEYS: &[&str] = &["password"];

/// Target of an API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A regular API operation, e.g. `GetUsers`
    Invoke(String),
    /// Status refresh of a long running task
    GetStatus,
    /// Cancellation of a long running task
    CancelAsync,
}

impl Endpoint {
    pub fn invoke(method: impl Into<String>) -> Self {
        Endpoint::Invoke(method.into())
    }

    /// Path relative to the API base URL.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Invoke(method) => format!("invoke/{}", method),
            Endpoint::GetStatus => "get-status".to_string(),
            Endpoint::CancelAsync => "cancel-async".to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Endpoint::Invoke(method) => method,
            Endpoint::GetStatus => "get-status",
            Endpoint::CancelAsync => "cancel-async",
        }
    }
}

/// Ordered, form-encoded call arguments.
///
/// Arguments without a value (`None` or an empty string) are left out of
/// the request entirely, the server then applies its own default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments(Vec<(String, String)>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument.
    pub fn arg(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.0.push((key.to_string(), value));
        }
        self
    }

    /// Add an argument if it has a value.
    pub fn opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.arg(key, v),
            None => self,
        }
    }

    /// Add a boolean as `true`/`false`.
    pub fn flag(self, key: &str, value: bool) -> Self {
        self.arg(key, if value { "true" } else { "false" })
    }

    /// Add a comma-separated list.
    pub fn list<S: AsRef<str>>(self, key: &str, values: &[S]) -> Self {
        let joined = values
            .iter()
            .map(|v| v.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        self.arg(key, joined)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }

    /// Encoded body with password values replaced, for logs and errors.
    pub fn encode_redacted(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter().map(|(k, v)| {
                let shown = if REDACTED_KEYS.contains(&k.as_str()) {
                    "***"
                } else {
                    v.as_str()
                };
                (k.as_str(), shown)
            }))
            .finish()
    }
}

/// One API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub arguments: Arguments,
    /// Time the server may hold the request open (status refreshes only)
    pub long_poll: Option<Duration>,
}

impl ApiRequest {
    pub fn invoke(method: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            endpoint: Endpoint::invoke(method),
            arguments,
            long_poll: None,
        }
    }

    pub fn get_status(token: &str, wait_time: Duration, last_known_version: &str) -> Self {
        Self {
            endpoint: Endpoint::GetStatus,
            arguments: Arguments::new()
                .arg("token", token)
                .arg("millisecondsTimeout", wait_time.as_millis())
                .arg("lastKnownStatusVersion", last_known_version),
            long_poll: Some(wait_time),
        }
    }

    pub fn cancel_async(token: &str) -> Self {
        Self {
            endpoint: Endpoint::CancelAsync,
            arguments: Arguments::new().arg("token", token),
            long_poll: None,
        }
    }
}

/// Performs API calls and returns the decoded JSON envelope.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(&self, request: &ApiRequest) -> Result<Value>;
}

/// [`Transport`] over HTTPS with Basic authentication.
pub struct HttpTransport {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for the server described by `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?;

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(format!("mailstore-client/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            request_timeout: config.request_timeout,
        })
    }

    /// Base URL all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, endpoint: &Endpoint) -> Result<Url> {
        self.base_url
            .join(&endpoint.path())
            .map_err(|e| MailStoreError::InvalidUrl(format!("{}: {}", endpoint.path(), e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, request: &ApiRequest) -> Result<Value> {
        let url = self.url_for(&request.endpoint)?;
        let timeout = self
            .request_timeout
            .saturating_add(request.long_poll.unwrap_or_default());

        debug!(
            method = %request.endpoint.name(),
            arguments = %request.arguments.encode_redacted(),
            "Calling API method"
        );
        info!(url = %url, "HTTP POST");

        let response = self
            .http
            .post(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .form(request.arguments.pairs())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    MailStoreError::ServerUnreachable(e.to_string())
                } else {
                    MailStoreError::Request(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = if error_text.trim().is_empty() {
                status.canonical_reason().unwrap_or("").to_string()
            } else {
                error_text
            };
            let err = MailStoreError::Http {
                status: status.as_u16(),
                message,
                url: url.to_string(),
                method: "POST".to_string(),
                data: request.arguments.encode_redacted(),
            };
            error!(error = %err, "API call failed");
            return Err(err);
        }

        let bytes = response.bytes().await?;
        let value = decode_body(&bytes)?;
        debug!(method = %request.endpoint.name(), response = %value, "HTTP response");
        Ok(value)
    }
}

/// Decode a response body, ignoring a leading UTF-8 byte order mark.
pub(crate) fn decode_body(bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| MailStoreError::Parse(format!("Response is not UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    serde_json::from_str(text)
        .map_err(|e| MailStoreError::Parse(format!("Failed to parse API response: {}", e)))
}
