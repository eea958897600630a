//! Client for the Dify console API.
//!
//! The console is the management API mounted under `/console/api`. It uses
//! cookie sessions with double-submit CSRF protection rather than API keys.
//!
//! # Example
//!
//! ```ignore
//! use dify_creator::console::{ConsoleClient, ConsoleConfig, ImportRequest};
//!
//! let client = ConsoleClient::new(&ConsoleConfig::new("https://dify.example.com"))?;
//! client.login("me@example.com", "secret", false).await?;
//! let result = client.import_app(&ImportRequest::from_content(dsl)).await?;
//! ```

mod client;
mod config;
mod error;
pub mod http;
mod run;
mod types;

#[cfg(test)]
mod test_server;

pub use client::ConsoleClient;
pub use config::{API_PREFIX, ConsoleConfig, DEFAULT_TIMEOUT};
pub use error::{Error, ErrorDetail};
pub use run::{RunStream, collect_events};
pub use types::{ImportMode, ImportRequest, ImportResult, ImportStatus, RunCollection, RunRequest};
