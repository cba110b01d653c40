//! Response sink: the write boundary for one request.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::Full;
use std::str::FromStr;
use tracing::warn;

/// Destination for one response: headers, a status code, and body bytes.
///
/// The total body byte count is tracked so the surrounding layer can log it
/// once the response has been fully written.
pub trait ResponseSink: Send {
    /// Append a header value, preserving any values already present under
    /// the same name.
    fn append_header(&mut self, name: &str, value: &str);

    /// First value recorded for a header name, if any.
    fn header(&self, name: &str) -> Option<String>;

    /// Write the status code. Only the first write takes effect.
    fn write_status(&mut self, status: StatusCode);

    /// Append body bytes.
    fn write_body(&mut self, chunk: &[u8]);

    /// Total body bytes written so far.
    fn bytes_written(&self) -> usize;
}

/// Sink that accumulates an `http::Response`.
#[derive(Debug, Default)]
pub struct HttpSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl HttpSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status written so far; 200 when none was written.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Body bytes accumulated so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert into the response to hand to the HTTP transport.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for HttpSink {
    fn append_header(&mut self, name: &str, value: &str) {
        // Names and values are validated at config load; anything invalid
        // that still reaches this point is dropped rather than aborting
        // the response.
        match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => {
                warn!(header = %name, "dropping invalid response header");
            }
        }
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    fn bytes_written(&self) -> usize {
        self.body.len()
    }
}
