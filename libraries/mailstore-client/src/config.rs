//! Client configuration.
//!
//! A [`ClientConfig`] is built once and shared read-only by every call made
//! through a client. Values can come from code (builder methods), from an
//! optional `mailstore.toml` file and from `MAILSTORE_*` environment variables.

use crate::error::{MailStoreError, Result};
use crate::lro::ProgressCallback;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

/// Default port of the MailStore Server Administration API.
pub const DEFAULT_SERVER_PORT: u16 = 8463;

/// Default port of the MailStore SPE Management API.
pub const DEFAULT_SPE_PORT: u16 = 8474;

/// Default server-side long-poll budget for status refreshes.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_millis(1000);

/// Verbosity of the client's own log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No log output
    #[serde(alias = "NONE")]
    None,
    /// Errors only
    #[serde(alias = "ERROR")]
    Error,
    /// Errors and warnings
    #[default]
    #[serde(alias = "WARNING", alias = "warn")]
    Warning,
    /// Informational messages about what is being done
    #[serde(alias = "INFO")]
    Info,
    /// Also the data sent and received
    #[serde(alias = "DEBUG")]
    Debug,
}

impl LogLevel {
    /// The `tracing` filter matching this level.
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::None => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = MailStoreError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(LogLevel::None),
            1 => Ok(LogLevel::Error),
            2 => Ok(LogLevel::Warning),
            3 => Ok(LogLevel::Info),
            4 => Ok(LogLevel::Debug),
            other => Err(MailStoreError::Config(format!(
                "log level must be between 0 and 4, got {}",
                other
            ))),
        }
    }
}

/// Install a `tracing` fmt subscriber filtered at `level`.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case that subscriber keeps deciding what gets printed.
pub fn init_logging(level: LogLevel) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level.as_level_filter())
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Hardening knobs for the status token poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Overall time budget for driving a task to completion (`None` = unbounded)
    pub deadline: Option<Duration>,
    /// Retries of a status refresh after a transient transport failure
    pub max_retries: u32,
    /// Backoff before the first retry, doubled on every further retry
    pub initial_backoff: Duration,
    /// Upper bound for the backoff
    pub max_backoff: Duration,
    /// Accept a refresh whose status version equals the previous one.
    ///
    /// A decreasing version is rejected regardless.
    pub allow_unchanged_version: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            deadline: None,
            max_retries: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            allow_unchanged_version: false,
        }
    }
}

impl PollPolicy {
    /// Policy that never retries and never gives up.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the overall deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the retry count for transient failures.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff bounds.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Accept unchanged status versions between refreshes.
    pub fn with_unchanged_version_allowed(mut self, allowed: bool) -> Self {
        self.allow_unchanged_version = allowed;
        self
    }

    /// Backoff before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Configuration for connecting to a MailStore server.
#[derive(Clone)]
pub struct ClientConfig {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Use `https://` (the server only speaks TLS; `false` is for local testing)
    pub use_https: bool,
    /// Accept self-signed server certificates
    pub accept_invalid_certs: bool,
    /// Timeout for a single HTTP request, extended by the long-poll budget
    /// for status refreshes
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Poll status tokens to completion instead of returning them
    pub auto_handle_token: bool,
    /// Server-side long-poll budget per status refresh
    pub wait_time: Duration,
    /// Called with every observed state of a tracked task
    pub progress: Option<ProgressCallback>,
    pub poll_policy: PollPolicy,
    /// Not read by the client. Pass it to [`init_logging`] to install a
    /// subscriber at this level.
    pub log_level: LogLevel,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_SERVER_PORT,
            use_https: true,
            accept_invalid_certs: false,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            auto_handle_token: true,
            wait_time: DEFAULT_WAIT_TIME,
            progress: None,
            poll_policy: PollPolicy::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_https", &self.use_https)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("auto_handle_token", &self.auto_handle_token)
            .field("wait_time", &self.wait_time)
            .field("progress", &self.progress.is_some())
            .field("poll_policy", &self.poll_policy)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration for a MailStore Server with the given credentials.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Defaults for a MailStore Service Provider Edition management server.
    pub fn spe() -> Self {
        Self {
            port: DEFAULT_SPE_PORT,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_auto_handle_token(mut self, auto: bool) -> Self {
        self.auto_handle_token = auto;
        self
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Base URL of the API, e.g. `https://127.0.0.1:8463/api/`.
    pub fn base_url(&self) -> Result<Url> {
        let scheme = if self.use_https { "https" } else { "http" };
        let raw = format!("{}://{}:{}/api/", scheme, self.host, self.port);
        Url::parse(&raw).map_err(|e| MailStoreError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MailStoreError::Config("host cannot be empty".into()));
        }
        if self.port == 0 {
            return Err(MailStoreError::Config("port cannot be 0".into()));
        }
        if self.wait_time.is_zero() {
            return Err(MailStoreError::Config(
                "wait time must be at least 1 ms".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(MailStoreError::Config(
                "request timeout must be positive".into(),
            ));
        }
        if self.poll_policy.initial_backoff > self.poll_policy.max_backoff {
            return Err(MailStoreError::Config(
                "initial backoff exceeds maximum backoff".into(),
            ));
        }
        self.base_url().map(|_| ())
    }

    /// Overlay `mailstore.toml` (if present) and `MAILSTORE_*` environment
    /// variables onto this configuration.
    pub fn load(self) -> Result<Self> {
        self.layered(PathBuf::from("mailstore.toml"), false)
    }

    /// Like [`ClientConfig::load`] but with an explicit, required file.
    pub fn load_file(self, path: impl AsRef<Path>) -> Result<Self> {
        self.layered(path.as_ref().to_path_buf(), true)
    }

    fn layered(self, path: PathBuf, required: bool) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(required))
            .add_source(::config::Environment::with_prefix("MAILSTORE").try_parsing(true))
            .build()
            .map_err(|e| MailStoreError::Config(e.to_string()))?;

        let overrides: ClientSettings = settings
            .try_deserialize()
            .map_err(|e| MailStoreError::Config(e.to_string()))?;

        let config = overrides.apply(self);
        config.validate()?;
        Ok(config)
    }
}

/// File/environment representation of [`ClientConfig`]; absent keys keep
/// the value already configured.
#[derive(Debug, Default, Deserialize)]
struct ClientSettings {
    username: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    use_https: Option<bool>,
    accept_invalid_certs: Option<bool>,
    request_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    auto_handle_token: Option<bool>,
    wait_time_ms: Option<u64>,
    log_level: Option<LogLevel>,
    poll_deadline_ms: Option<u64>,
    poll_max_retries: Option<u32>,
}

impl ClientSettings {
    fn apply(self, mut config: ClientConfig) -> ClientConfig {
        if let Some(v) = self.username {
            config.username = v;
        }
        if let Some(v) = self.password {
            config.password = v;
        }
        if let Some(v) = self.host {
            config.host = v;
        }
        if let Some(v) = self.port {
            config.port = v;
        }
        if let Some(v) = self.use_https {
            config.use_https = v;
        }
        if let Some(v) = self.accept_invalid_certs {
            config.accept_invalid_certs = v;
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = self.auto_handle_token {
            config.auto_handle_token = v;
        }
        if let Some(ms) = self.wait_time_ms {
            config.wait_time = Duration::from_millis(ms);
        }
        if let Some(v) = self.log_level {
            config.log_level = v;
        }
        if let Some(ms) = self.poll_deadline_ms {
            config.poll_policy.deadline = Some(Duration::from_millis(ms));
        }
        if let Some(v) = self.poll_max_retries {
            config.poll_policy.max_retries = v;
        }
        config
    }
}
