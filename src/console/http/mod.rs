//! HTTP transport and stream parsing for the console API.

mod client;
mod sse;

pub use client::{
    CSRF_COOKIE, CSRF_HEADER, ConsoleRequest, HttpClient, Timeout, error_for_status, http_error,
    read_json,
};
pub use sse::{DONE_MARKER, SseData, SseLineParser, json_events};
