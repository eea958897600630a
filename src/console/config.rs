//! Connection settings for one console.

use std::time::Duration;

/// Path the console API is mounted under.
pub const API_PREFIX: &str = "console/api";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Immutable connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    base_url: String,
    verify_ssl: bool,
    timeout: Option<Duration>,
}

impl ConsoleConfig {
    /// Settings for `base_url` with certificate checks on and the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            verify_ssl: true,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    #[must_use]
    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    /// `None` disables the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn verify_ssl(&self) -> bool {
        self.verify_ssl
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Root of the console API, e.g. `https://dify.example.com/console/api`.
    pub fn api_base(&self) -> String {
        join_url(&self.base_url, API_PREFIX)
    }
}

/// Join two URL parts with exactly one slash between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
