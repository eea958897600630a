//! Console API operations.

use crate::console::config::ConsoleConfig;
use crate::console::error::Error;
use crate::console::http::{
    ConsoleRequest, HttpClient, Timeout, error_for_status, http_error, read_json,
};
use crate::console::run::{RunStream, collect_events};
use crate::console::types::{ImportRequest, ImportResult, LoginRequest, RunCollection, RunRequest};
use reqwest::StatusCode;
use reqwest::header::{HeaderName, HeaderValue};
use std::time::Duration;

/// Header used to propagate an external trace id into the run.
const TRACE_ID_HEADER: &str = "x-external-trace-id";

/// Client for the Dify console API.
///
/// Authentication follows the console's cookie model: `POST /login` sets
/// `access_token`, `refresh_token` and a readable `csrf_token` cookie; every
/// mutating request afterwards echoes the CSRF cookie in `X-CSRF-Token`.
#[derive(Debug)]
pub struct ConsoleClient {
    http: HttpClient,
}

impl ConsoleClient {
    pub fn new(config: &ConsoleConfig) -> Result<Self, Error> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Log in with email and password.
    ///
    /// The password is sent as given; the console does not expect it to be
    /// hashed client-side. Fails with [`Error::MissingCsrfToken`] if the
    /// console did not issue a CSRF cookie.
    pub async fn login(&self, email: &str, password: &str, remember_me: bool) -> Result<(), Error> {
        let body = LoginRequest {
            email,
            password,
            remember_me,
        };
        let response = self.http.send(ConsoleRequest::post("/login").json(&body)?).await?;
        error_for_status(response).await?;

        if self.http.csrf_token().is_none() {
            return Err(Error::MissingCsrfToken);
        }
        tracing::info!(email, "Logged in to console");
        Ok(())
    }

    /// Import a DSL document, creating an app or overwriting `app_id`.
    ///
    /// The console answers 200 for finished imports and 202 for imports
    /// that need [`confirm_import`](Self::confirm_import); everything else
    /// is an error.
    pub async fn import_app(&self, request: &ImportRequest) -> Result<ImportResult, Error> {
        let payload = request.payload()?;
        tracing::debug!(mode = ?payload.mode, app_id = ?payload.app_id, "Importing app");

        let response = self
            .http
            .send(ConsoleRequest::post("/apps/imports").json(&payload)?)
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => {
                let result: ImportResult = read_json(response).await?;
                tracing::info!(id = ?result.id(), status = ?result.status(), "Import finished");
                Ok(result)
            }
            _ => Err(http_error(response).await),
        }
    }

    /// Confirm a pending import.
    pub async fn confirm_import(&self, import_id: &str) -> Result<ImportResult, Error> {
        let path = format!("/apps/imports/{}/confirm", urlencoding::encode(import_id));
        let result: ImportResult = self.http.send_json(ConsoleRequest::post(path)).await?;
        tracing::info!(import_id, status = ?result.status(), "Import confirmed");
        Ok(result)
    }

    /// Export an app as DSL text.
    pub async fn export_app(
        &self,
        app_id: &str,
        include_secret: bool,
        workflow_id: Option<&str>,
    ) -> Result<String, Error> {
        let path = format!("/apps/{}/export", urlencoding::encode(app_id));
        let mut request =
            ConsoleRequest::get(path).query("include_secret", include_secret.to_string());
        if let Some(workflow_id) = workflow_id.filter(|id| !id.is_empty()) {
            request = request.query("workflow_id", workflow_id);
        }

        let body: serde_json::Value = self.http.send_json(request).await?;
        match body.get("data") {
            Some(serde_json::Value::String(dsl)) => Ok(dsl.clone()),
            Some(serde_json::Value::Null) | None => Err(Error::UnexpectedResponse(format!(
                "export response has no data field: {body}"
            ))),
            Some(other) => Ok(other.to_string()),
        }
    }

    /// Start a draft workflow run and return its event stream.
    ///
    /// The request has no timeout; runs can take arbitrarily long.
    pub async fn run_draft_workflow_stream(
        &self,
        app_id: &str,
        request: &RunRequest,
        external_trace_id: Option<&str>,
    ) -> Result<RunStream, Error> {
        let path = format!("/apps/{}/workflows/draft/run", urlencoding::encode(app_id));
        let mut console_request = ConsoleRequest::post(path)
            .json(request)?
            .timeout(Timeout::Unbounded)
            .streaming();

        if let Some(trace_id) = external_trace_id.filter(|id| !id.is_empty()) {
            let value = HeaderValue::from_str(trace_id).map_err(|_| {
                Error::InvalidInput("external trace id contains invalid header characters".into())
            })?;
            let name = HeaderName::from_static(TRACE_ID_HEADER);
            console_request = console_request.header(name, value);
        }

        tracing::debug!(app_id, inputs = request.inputs.len(), "Starting draft run");
        let response = self.http.send(console_request).await?;
        let response = error_for_status(response).await?;
        Ok(RunStream::new(response))
    }

    /// Run the draft workflow and collect its events.
    ///
    /// See [`collect_events`] for how `max_wait` bounds collection.
    pub async fn run_draft_workflow_collect(
        &self,
        app_id: &str,
        request: &RunRequest,
        external_trace_id: Option<&str>,
        max_wait: Option<Duration>,
    ) -> Result<RunCollection, Error> {
        let stream = self
            .run_draft_workflow_stream(app_id, request, external_trace_id)
            .await?;
        let collection = collect_events(stream.events(), max_wait).await?;
        tracing::info!(app_id, events = collection.len(), "Draft run collected");
        Ok(collection)
    }
}
