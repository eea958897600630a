//! Cookie-session HTTP transport for the console API.

use crate::console::config::{ConsoleConfig, join_url};
use crate::console::error::{Error, ErrorDetail};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Connection timeout, independent of the per-request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Cookie the console sets at login for double-submit CSRF protection.
pub const CSRF_COOKIE: &str = "csrf_token";
/// Header that must echo the CSRF cookie on mutating requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Timeout policy for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Timeout {
    /// Use the client's configured timeout.
    #[default]
    Default,
    /// Override the configured timeout.
    Limit(Duration),
    /// No timeout at all.
    Unbounded,
}

impl Timeout {
    fn resolve(self, configured: Option<Duration>) -> Option<Duration> {
        match self {
            Self::Default => configured,
            Self::Limit(limit) => Some(limit),
            Self::Unbounded => None,
        }
    }
}

/// A request against the console API, relative to the API root.
#[derive(Debug)]
pub struct ConsoleRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    timeout: Timeout,
    stream: bool,
}

impl ConsoleRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            timeout: Timeout::Default,
            stream: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask for an event stream (`Accept: text/event-stream`).
    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// HTTP client holding the login session.
///
/// Cookies set by the console (`access_token`, `refresh_token`,
/// `csrf_token`) live in the client's jar and are replayed on every later
/// request. The jar is owned by this client; there is no logout.
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    jar: Arc<Jar>,
    api_base: String,
    cookie_url: Url,
    timeout: Option<Duration>,
}

impl HttpClient {
    /// Create a client for the console described by `config`.
    pub fn new(config: &ConsoleConfig) -> Result<Self, Error> {
        let api_base = config.api_base();
        let cookie_url = Url::parse(&format!("{api_base}/"))
            .map_err(|e| Error::Build(format!("invalid base URL {:?}: {e}", config.base_url())))?;

        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(!config.verify_ssl())
            .build()
            .map_err(|e| Error::Build(e.to_string()))?;

        Ok(Self {
            client,
            jar,
            api_base,
            cookie_url,
            timeout: config.timeout(),
        })
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        join_url(&self.api_base, path)
    }

    /// Current value of a session cookie.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.cookie_url)?;
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.cookie(CSRF_COOKIE)
    }

    /// Add the CSRF header to mutating requests when the session has one.
    /// A header the caller already set is kept.
    fn with_csrf(&self, method: &Method, mut headers: HeaderMap) -> Result<HeaderMap, Error> {
        if is_safe_method(method) {
            return Ok(headers);
        }
        let name = HeaderName::from_static(CSRF_HEADER);
        if headers.contains_key(&name) {
            return Ok(headers);
        }
        if let Some(token) = self.csrf_token() {
            let value = HeaderValue::from_str(&token).map_err(|_| {
                Error::UnexpectedResponse("csrf_token cookie is not a valid header value".into())
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// Send a request without checking its status.
    pub async fn send(&self, request: ConsoleRequest) -> Result<Response, Error> {
        let url = self.url(&request.path);
        let mut headers = self.with_csrf(&request.method, request.headers)?;
        if request.stream {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout.resolve(self.timeout) {
            builder = builder.timeout(timeout);
        }

        tracing::debug!(method = %request.method, %url, stream = request.stream, "Console request");
        let response = builder.send().await?;
        tracing::debug!(status = response.status().as_u16(), %url, "Console response");

        Ok(response)
    }

    /// Send a request, require a 2xx status and decode the JSON body.
    pub async fn send_json<R: DeserializeOwned>(
        &self,
        request: ConsoleRequest,
    ) -> Result<R, Error> {
        let response = self.send(request).await?;
        let response = error_for_status(response).await?;
        read_json(response).await
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Pass 2xx responses through; turn anything else into [`Error::Http`].
pub async fn error_for_status(response: Response) -> Result<Response, Error> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(http_error(response).await)
    }
}

/// Build an [`Error::Http`] from a response, consuming its body.
pub async fn http_error(response: Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Error::Http {
        status,
        detail: ErrorDetail::from_body(&body),
    }
}

/// Decode a successful response body as JSON.
pub async fn read_json<R: DeserializeOwned>(response: Response) -> Result<R, Error> {
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| Error::UnexpectedResponse(format!("invalid JSON body: {e}; body: {text}")))
}
