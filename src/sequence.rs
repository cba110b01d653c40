//! Route sequencer: serves a route's scripted responses in order.
//!
//! Each route owns one sequencer for the lifetime of the process. The
//! cursor and the per-entry repeat budgets are the only mutable state; both
//! live behind a single per-route lock.

use crate::config::{BodySource, ScriptedResponse};
use crate::request::MockRequest;
use crate::sink::ResponseSink;
use crate::template::TemplateEngine;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::StatusCode;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("cannot read body file {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
}

/// Result of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// An entry was served; status and body byte count as written to the sink.
    Selected {
        status: StatusCode,
        bytes_written: usize,
    },
    /// The script ran out of entries; the caller answers 404.
    Exhausted,
}

enum Slot {
    Entry(usize),
    Exhausted,
}

struct CursorState {
    cursor: usize,
    /// Remaining repeat budget per entry; `None` marks a sticky entry.
    remaining: Vec<Option<u32>>,
}

/// Serves one route's ordered response script.
pub struct RouteSequencer {
    entries: Vec<ScriptedResponse>,
    engine: Arc<TemplateEngine>,
    state: Mutex<CursorState>,
}

impl RouteSequencer {
    pub fn new(entries: Vec<ScriptedResponse>, engine: Arc<TemplateEngine>) -> Self {
        let remaining = entries.iter().map(|e| e.repeat).collect();
        Self {
            entries,
            engine,
            state: Mutex::new(CursorState {
                cursor: 0,
                remaining,
            }),
        }
    }

    /// Answer one request: select the current entry, render its body and
    /// write headers, status and body to the sink.
    ///
    /// Returns [`Outcome::Exhausted`] without touching the sink once the
    /// script has run out; the cursor never wraps around.
    pub async fn handle(&self, request: &MockRequest, sink: &mut dyn ResponseSink) -> Outcome {
        let entry = match self.claim() {
            Slot::Exhausted => return Outcome::Exhausted,
            Slot::Entry(idx) => &self.entries[idx],
        };

        // The claim above already consumed a repeat turn; that consumption
        // stands even if rendering fails or the client goes away.
        let body = match self.resolve_body(entry, request).await {
            Ok(body) => body,
            Err(err) => return answer_body_error(sink, &err),
        };

        for (name, values) in &entry.headers {
            for value in values {
                sink.append_header(name, value);
            }
        }
        if entry.is_json && sink.header(CONTENT_TYPE.as_str()).is_none() {
            sink.append_header(CONTENT_TYPE.as_str(), "application/json");
        }

        let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
        sink.write_status(status);
        if !body.is_empty() {
            sink.write_body(&body);
        }

        Outcome::Selected {
            status,
            bytes_written: sink.bytes_written(),
        }
    }

    /// Pick the entry answering this invocation, consuming one repeat turn.
    ///
    /// Runs under the route lock: concurrent requests can neither
    /// double-consume a turn nor observe a stale cursor. Entries whose
    /// budget hit zero are skipped for good. The lock is released before
    /// any body rendering starts.
    fn claim(&self) -> Slot {
        let mut state = self.state.lock().unwrap();
        loop {
            let idx = state.cursor;
            if idx >= self.entries.len() {
                return Slot::Exhausted;
            }
            match state.remaining[idx] {
                Some(0) => state.cursor += 1,
                Some(n) => {
                    state.remaining[idx] = Some(n - 1);
                    return Slot::Entry(idx);
                }
                None => return Slot::Entry(idx),
            }
        }
    }

    async fn resolve_body(
        &self,
        entry: &ScriptedResponse,
        request: &MockRequest,
    ) -> Result<Bytes, BodyError> {
        match &entry.body {
            BodySource::Literal { content } => Ok(Bytes::copy_from_slice(content.as_bytes())),
            BodySource::Template { content } => Ok(self.engine.render_or_fallback(content, request)),
            // Always re-read, so edits to the file show up on the next request
            BodySource::File { path } => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|source| BodyError::FileRead {
                    path: path.clone(),
                    source,
                }),
            BodySource::Empty => Ok(Bytes::new()),
        }
    }
}

/// An unreadable body file answers the request with a 500 and the error
/// text; later entries are not consulted.
fn answer_body_error(sink: &mut dyn ResponseSink, err: &BodyError) -> Outcome {
    warn!(error = %err, "cannot resolve response body");
    sink.append_header(CONTENT_TYPE.as_str(), "text/plain; charset=utf-8");
    sink.write_status(StatusCode::INTERNAL_SERVER_ERROR);
    sink.write_body(err.to_string().as_bytes());
    Outcome::Selected {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        bytes_written: sink.bytes_written(),
    }
}
