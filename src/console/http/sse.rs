//! Line parser for the console's SSE-style streaming responses.
//!
//! The draft-run endpoint writes one `data: {json}` line per event, separated
//! by blank lines, and may finish with a `data: [DONE]` sentinel. Only `data:`
//! lines carry events; `event:`, `id:` and comment lines are ignored.

use crate::console::error::Error;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

/// Payload that terminates the stream.
pub const DONE_MARKER: &str = "[DONE]";

/// A parsed `data:` line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseData {
    Event(serde_json::Value),
    Done,
}

/// Incremental line parser.
///
/// Buffers raw bytes until a full line is available, so a UTF-8 sequence
/// split across network chunks is decoded intact. After the `[DONE]` marker
/// every further input is discarded.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
    done: bool,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the data of every complete line in it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseData> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut parsed = Vec::new();
        while let Some((end, next)) = self.line_break() {
            let line: Vec<u8> = self.buffer.drain(..next).take(end).collect();
            if let Some(data) = Self::parse_line(&line) {
                let done = data == SseData::Done;
                parsed.push(data);
                if done {
                    self.done = true;
                    self.buffer.clear();
                    break;
                }
            }
        }
        parsed
    }

    /// Flush a trailing line that had no terminating newline.
    pub fn finish(&mut self) -> Vec<SseData> {
        if self.done || self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        let data = Self::parse_line(&line);
        if data == Some(SseData::Done) {
            self.done = true;
        }
        data.into_iter().collect()
    }

    /// Whether the `[DONE]` marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Check if there's a partial line in the buffer.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// End of the first complete line and the start of the next one.
    ///
    /// `\n`, `\r\n` and a lone `\r` all end a line. A `\r` at the end of the
    /// buffer is held back until the next byte shows whether `\n` follows.
    fn line_break(&self) -> Option<(usize, usize)> {
        let pos = self.buffer.iter().position(is_line_end)?;
        if self.buffer[pos] == b'\n' {
            return Some((pos, pos + 1));
        }
        match self.buffer.get(pos + 1) {
            Some(b'\n') => Some((pos, pos + 2)),
            Some(_) => Some((pos, pos + 1)),
            None => None,
        }
    }

    fn parse_line(raw: &[u8]) -> Option<SseData> {
        let line = String::from_utf8_lossy(raw);
        let payload = line.trim().strip_prefix("data:")?.trim();
        if payload.is_empty() {
            return None;
        }
        if payload == DONE_MARKER {
            return Some(SseData::Done);
        }

        match serde_json::from_str(payload) {
            Ok(value) => Some(SseData::Event(value)),
            Err(e) => {
                // Some events are plain text (pings, progress markers).
                tracing::trace!(error = %e, payload, "Skipping non-JSON data line");
                None
            }
        }
    }
}

fn is_line_end(byte: &u8) -> bool {
    matches!(byte, b'\n' | b'\r')
}

struct EventState<S> {
    chunks: Pin<Box<S>>,
    parser: SseLineParser,
    pending: VecDeque<serde_json::Value>,
    finished: bool,
}

impl<S> EventState<S> {
    fn absorb(&mut self, parsed: Vec<SseData>) {
        for data in parsed {
            match data {
                SseData::Event(value) => self.pending.push_back(value),
                SseData::Done => {
                    self.finished = true;
                    break;
                }
            }
        }
    }
}

/// Turn a byte stream into a lazy stream of JSON events.
///
/// Ends at `[DONE]` (the byte stream is not polled again) or when the byte
/// stream ends. A read error is yielded once and ends the sequence.
pub fn json_events<S, E>(chunks: S) -> impl Stream<Item = Result<serde_json::Value, Error>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let state = EventState {
        chunks: Box::pin(chunks),
        parser: SseLineParser::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }

            match state.chunks.next().await {
                Some(Ok(bytes)) => {
                    let parsed = state.parser.feed(&bytes);
                    state.absorb(parsed);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(Error::Stream(e.to_string())), state));
                }
                None => {
                    let parsed = state.parser.finish();
                    state.absorb(parsed);
                    state.finished = true;
                }
            }
        }
    })
}
