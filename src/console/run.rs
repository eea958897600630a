//! Draft run streams and event collection.

use crate::console::error::Error;
use crate::console::http::json_events;
use crate::console::types::RunCollection;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

/// An open draft-run response.
///
/// Owns the connection; dropping it (or the event stream made from it)
/// closes the connection.
#[derive(Debug)]
pub struct RunStream {
    response: reqwest::Response,
}

impl RunStream {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        Self { response }
    }

    pub fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    /// Consume the response as a stream of JSON events.
    ///
    /// The stream ends at the `[DONE]` marker or when the server closes the
    /// connection. It cannot be restarted.
    pub fn events(self) -> impl Stream<Item = Result<serde_json::Value, Error>> {
        json_events(self.response.bytes_stream())
    }
}

/// Drain an event stream into a [`RunCollection`].
///
/// With `max_wait`, stops after the first event that arrives once the
/// budget, measured from the first event, is used up. The check runs only
/// between events, so the cutoff is soft: waiting for the first event and
/// any single read are not bounded. The budget is inclusive: an event
/// arriving exactly when it runs out is the last one kept.
pub async fn collect_events<S>(
    events: S,
    max_wait: Option<Duration>,
) -> Result<RunCollection, Error>
where
    S: Stream<Item = Result<serde_json::Value, Error>>,
{
    futures::pin_mut!(events);

    let mut collection = RunCollection::default();
    let mut first_event_at: Option<Instant> = None;

    while let Some(event) = events.next().await {
        let event = event?;
        let started = *first_event_at.get_or_insert_with(Instant::now);
        collection.push(event);

        if let Some(budget) = max_wait
            && started.elapsed() >= budget
        {
            tracing::debug!(
                events = collection.len(),
                budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                "Wait budget used up, stopping collection"
            );
            break;
        }
    }

    Ok(collection)
}
