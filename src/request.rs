//! Buffered view of an incoming request.

use bytes::Bytes;
use http::{HeaderMap, Method};
use std::collections::HashMap;

/// An incoming request with its body fully buffered.
///
/// This is the value handed to a route's sequencer and projected into the
/// template scope; it carries everything a scripted response may refer to.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockRequest {
    pub fn new(method: Method, path: &str, query: Option<&str>) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: query.map(str::to_string),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Build from the parts of a buffered hyper request.
    pub fn from_parts(parts: &http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            body,
        }
    }

    /// Decoded query parameters. Repeated keys keep the last value.
    pub fn query_params(&self) -> HashMap<String, String> {
        parse_query_string(self.query.as_deref().unwrap_or(""))
    }

    /// Headers flattened to lowercase-name -> first-value pairs.
    pub fn header_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for (name, value) in &self.headers {
            if let Ok(v) = value.to_str() {
                map.entry(name.as_str().to_string())
                    .or_insert_with(|| v.to_string());
            }
        }
        map
    }
}

/// Parse a query string into key-value pairs.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        if let Some((key, value)) = part.split_once('=') {
            params.insert(percent_decode(key), percent_decode(value));
        } else {
            params.insert(percent_decode(part), String::new());
        }
    }

    params
}

/// Simple URL decoding.
fn percent_decode(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    result.push(byte as char);
                    continue;
                }
            }
            result.push('%');
            result.push_str(&hex);
        } else if ch == '+' {
            result.push(' ');
        } else {
            result.push(ch);
        }
    }

    result
}
