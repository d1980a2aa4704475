//! MailStore API Client
//!
//! Async client for the administrative HTTP/JSON APIs of MailStore Server and
//! MailStore Service Provider Edition.
//!
//! # Features
//!
//! - **Server**: every operation of the Server Administration API
//! - **SPE**: every operation of the SPE Management API
//! - **Status tokens**: long running tasks are polled to completion, with
//!   progress callbacks, deadlines, retries and cancellation
//!
//! # Example
//!
//! ```ignore
//! use mailstore_client::{ClientConfig, ProgressCallback, ServerClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("archive.local", "admin", "secret")
//!         .with_accept_invalid_certs(true)
//!         .with_progress(ProgressCallback::new(|task| {
//!             println!("{}% {}", task.percent_progress().unwrap_or(0.0), task.token());
//!         }))
//!         .load()?;
//!     mailstore_client::init_logging(config.log_level);
//!
//!     let server = ServerClient::new(config)?;
//!     let result = server.verify_store(1).await?.into_result()?;
//!     println!("{}", result.json());
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod lro;
mod server;
mod spe;
mod transport;
mod types;

pub use client::{ApiClient, CallOptions};
pub use config::{
    init_logging, ClientConfig, LogLevel, PollPolicy, DEFAULT_SERVER_PORT, DEFAULT_SPE_PORT,
    DEFAULT_WAIT_TIME,
};
pub use error::{MailStoreError, Result};
pub use lro::{
    drive_to_completion, has_token, refresh_status, request_cancel, PollContext, ProgressCallback,
};
pub use server::{ServerClient, StoreOptions, UserOptions};
pub use spe::SpeClient;
pub use transport::{ApiRequest, Arguments, Endpoint, HttpTransport, Transport};
pub use types::{StatusCode, TaskResponse, TrackedTask};

// Cancellation tokens accepted by `CallOptions::cancel`
pub use tokio_util::sync::CancellationToken;
