//! Settings from the config file and environment.

use crate::console::{ConsoleConfig, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_BASE_URL: &str = "DIFY_BASE_URL";
pub const ENV_VERIFY_SSL: &str = "DIFY_VERIFY_SSL";
pub const ENV_TIMEOUT_S: &str = "DIFY_TIMEOUT_S";
pub const ENV_EMAIL: &str = "DIFY_EMAIL";
pub const ENV_PASSWORD: &str = "DIFY_PASSWORD";

const DOTENV_FILE: &str = ".env";

/// Raw settings before validation.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`DIFY_*`)
/// 2. Config file (`~/.config/dify-creator/config.toml` or `--config`)
/// 3. Built-in defaults
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: Option<String>,
    pub verify_ssl: Option<bool>,
    pub timeout_s: Option<f64>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout_s", &self.timeout_s)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Console login credentials.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dify-creator").join("config.toml"))
    }

    /// Load the config file and apply environment overrides.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        Ok(config.with_env())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))
    }

    /// Apply `DIFY_*` environment variables.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable lookup. Empty values count as unset.
    #[must_use]
    pub fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(base_url) = var(ENV_BASE_URL) {
            self.base_url = Some(base_url);
        }
        if let Some(verify) = var(ENV_VERIFY_SSL) {
            self.verify_ssl = Some(parse_bool(&verify));
        }
        if let Some(timeout) = var(ENV_TIMEOUT_S) {
            // Kept as NaN so `console()` can report the bad value.
            self.timeout_s = Some(timeout.parse().unwrap_or(f64::NAN));
        }
        if let Some(email) = var(ENV_EMAIL) {
            self.email = Some(email);
        }
        if let Some(password) = var(ENV_PASSWORD) {
            self.password = Some(password);
        }
        self
    }

    /// Connection settings. Requires a base URL.
    pub fn console(&self) -> Result<ConsoleConfig> {
        let base_url = self
            .base_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config(format!("{ENV_BASE_URL} is not set")))?;

        let timeout = match self.timeout_s {
            None => Some(DEFAULT_TIMEOUT),
            Some(secs) if secs.is_nan() => {
                return Err(Error::Config(format!("{ENV_TIMEOUT_S} must be a number of seconds")));
            }
            Some(secs) if secs <= 0.0 => None,
            Some(secs) => Some(Duration::try_from_secs_f64(secs).map_err(|e| {
                Error::Config(format!("{ENV_TIMEOUT_S} is out of range: {e}"))
            })?),
        };

        Ok(ConsoleConfig::new(base_url)
            .with_verify_ssl(self.verify_ssl.unwrap_or(true))
            .with_timeout(timeout))
    }

    /// Login credentials. Requires both email and password.
    pub fn credentials(&self) -> Result<Credentials> {
        let email = self
            .email
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config(format!("{ENV_EMAIL} is not set")))?;
        let password = self
            .password
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config(format!("{ENV_PASSWORD} is not set")))?;
        Ok(Credentials { email, password })
    }
}

/// Load `.env` from the working directory or the nearest parent that has
/// one. Variables already set in the environment keep their values.
pub fn load_dotenv() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    load_dotenv_from(&cwd)
}

/// Like [`load_dotenv`], searching upward from `dir`.
pub fn load_dotenv_from(dir: &Path) -> Option<PathBuf> {
    let path = find_dotenv(dir)?;
    dotenvy::from_path(&path).ok()?;
    Some(path)
}

fn find_dotenv(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .map(|d| d.join(DOTENV_FILE))
        .find(|p| p.is_file())
}

/// `1`, `true`, `yes`, `y` and `on` (any case) are true; anything else is false.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}
