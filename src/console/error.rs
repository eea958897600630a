//! Console client error types.

use std::fmt;
use thiserror::Error;

/// Body of a failed HTTP response.
///
/// Parsed as JSON when possible so callers can inspect the server's error
/// object; anything else is kept as raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    Json(serde_json::Value),
    Text(String),
}

impl ErrorDetail {
    /// Build a detail from a response body.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(json) => Self::Json(json),
            Err(_) => Self::Text(body.to_string()),
        }
    }

    /// Human-readable message, extracted from the JSON body if present.
    ///
    /// Handles the shapes the console returns:
    /// - `{"code": "...", "message": "...", "status": 400}`
    /// - `{"error": {"message": "..."}}`
    /// - `{"error": "..."}`
    ///
    /// Falls back to the full detail text.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Json(json) => extract_error_message(json).unwrap_or_else(|| json.to_string()),
            Self::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(json) => write!(f, "{json}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    if let Some(msg) = json.get("message").and_then(|v| v.as_str()) {
        let mut result = msg.to_string();
        if let Some(code) = json.get("code").and_then(|v| v.as_str()) {
            result = format!("{result} (code: {code})");
        }
        return Some(result);
    }

    let error = json.get("error")?;
    if let Some(msg) = error.get("message").and_then(|v| v.as_str()) {
        return Some(msg.to_string());
    }
    error.as_str().map(String::from)
}

#[derive(Debug, Error)]
pub enum Error {
    /// Caller passed a combination of arguments the API cannot accept.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: ErrorDetail },

    /// Successful status, but the body is not what the endpoint promises.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("No csrf_token cookie after login; check the console's cookie settings")]
    MissingCsrfToken,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to build console client: {0}")]
    Build(String),
}

impl Error {
    /// HTTP status for transport errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Message suitable for showing to a user.
    ///
    /// HTTP errors keep their status prefix but show only the server's
    /// message instead of the whole JSON body.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { status, detail } => format!("HTTP {status}: {}", detail.message()),
            other => other.to_string(),
        }
    }
}
