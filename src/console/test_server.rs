//! In-process fake console for client tests.

use crate::console::ConsoleConfig;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Response, Server};

/// A request as the fake console received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or_default()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Scripted response.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    body: String,
    headers: Vec<(String, String)>,
}

impl Reply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: vec![("Content-Type".into(), "application/json".into())],
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: vec![("Content-Type".into(), "text/plain".into())],
        }
    }

    pub fn event_stream(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            headers: vec![("Content-Type".into(), "text/event-stream".into())],
        }
    }

    pub fn with_cookie(mut self, cookie: &str) -> Self {
        self.headers.push(("Set-Cookie".into(), cookie.into()));
        self
    }
}

/// Fake console listening on an ephemeral local port.
///
/// Every request is passed to the handler and recorded. The server stops
/// when dropped.
pub struct FakeConsole {
    server: Arc<Server>,
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeConsole {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Reply + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let listener = server.clone();
        let log = requests.clone();
        let handle = thread::spawn(move || {
            for mut request in listener.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);

                let recorded = RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.as_str().to_string(), h.value.as_str().to_string()))
                        .collect(),
                    body,
                };
                let reply = handler(&recorded);
                log.lock().unwrap().push(recorded);

                let mut response = Response::from_string(reply.body).with_status_code(reply.status);
                for (name, value) in &reply.headers {
                    let header = Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap();
                    response.add_header(header);
                }
                let _ = request.respond(response);
            }
        });

        Self {
            server,
            base_url: format!("http://127.0.0.1:{port}"),
            requests,
            handle: Some(handle),
        }
    }

    /// Fake console that logs in successfully and sets a CSRF cookie,
    /// delegating every other request to `handler`.
    pub fn with_login<F>(csrf_token: &'static str, handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Reply + Send + 'static,
    {
        Self::start(move |request| {
            if request.path() == "/console/api/login" {
                Reply::json(200, serde_json::json!({"result": "success"}))
                    .with_cookie("access_token=acc-1; Path=/; HttpOnly")
                    .with_cookie("refresh_token=ref-1; Path=/; HttpOnly")
                    .with_cookie(&format!("csrf_token={csrf_token}; Path=/"))
            } else {
                handler(request)
            }
        })
    }

    pub fn config(&self) -> ConsoleConfig {
        ConsoleConfig::new(self.base_url.clone())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests other than the login call.
    pub fn api_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path() != "/console/api/login")
            .collect()
    }
}

impl Drop for FakeConsole {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
