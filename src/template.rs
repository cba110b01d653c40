//! Template engine for dynamic response bodies.
//!
//! Uses Handlebars, with the incoming request as the rendering context.

use crate::request::MockRequest;
use bytes::Bytes;
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Template engine for rendering dynamic responses.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

/// Request fields visible to templates.
#[derive(Debug, Serialize)]
struct RequestScope {
    /// Request method, e.g. `GET`
    method: String,
    /// Request path, without the query string
    path: String,
    /// Raw query string, empty when absent
    query_string: String,
    /// Decoded query parameters
    query: HashMap<String, String>,
    /// Request headers, lowercase names
    headers: HashMap<String, String>,
    /// Request body (as text, if valid UTF-8)
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    /// Request body as JSON (if parseable)
    #[serde(skip_serializing_if = "Option::is_none")]
    json: Option<serde_json::Value>,
}

impl RequestScope {
    fn new(request: &MockRequest) -> Self {
        let body = std::str::from_utf8(&request.body).ok().map(String::from);
        let json = body.as_ref().and_then(|s| serde_json::from_str(s).ok());

        Self {
            method: request.method.to_string(),
            path: request.path.clone(),
            query_string: request.query.clone().unwrap_or_default(),
            query: request.query_params(),
            headers: request.header_map(),
            body,
            json,
        }
    }
}

impl TemplateEngine {
    /// Create a new template engine.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        handlebars.register_helper("upper", Box::new(upper_helper));
        handlebars.register_helper("lower", Box::new(lower_helper));
        handlebars.register_helper("default", Box::new(default_helper));
        handlebars.register_helper("now", Box::new(now_helper));
        handlebars.register_helper("random", Box::new(random_helper));
        handlebars.register_helper("uuid", Box::new(uuid_helper));

        // Mock bodies are raw text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    /// Render a template string against the given request.
    pub fn render(
        &self,
        template: &str,
        request: &MockRequest,
    ) -> Result<String, handlebars::RenderError> {
        self.handlebars
            .render_template(template, &RequestScope::new(request))
    }

    /// Render a template, falling back to the raw template text when
    /// parsing or evaluation fails. Broken templates still produce a
    /// response, never an error status.
    pub fn render_or_fallback(&self, template: &str, request: &MockRequest) -> Bytes {
        match self.render(template, request) {
            Ok(rendered) => Bytes::from(rendered),
            Err(err) => {
                warn!(error = %err, "template rendering failed, emitting raw text");
                Bytes::copy_from_slice(template.as_bytes())
            }
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

// Custom Handlebars helpers

fn upper_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&value.to_uppercase())?;
    Ok(())
}

fn lower_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&value.to_lowercase())?;
    Ok(())
}

fn default_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let fallback = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("");

    match h.param(0).map(|v| v.value()) {
        Some(v) if !v.is_null() => match v.as_str() {
            Some(s) if s.is_empty() => out.write(fallback)?,
            Some(s) => out.write(s)?,
            None => out.write(&v.to_string())?,
        },
        _ => out.write(fallback)?,
    }

    Ok(())
}

fn now_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    use chrono::Utc;

    let format = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .unwrap_or("%Y-%m-%dT%H:%M:%S%.3fZ");

    out.write(&Utc::now().format(format).to_string())?;
    Ok(())
}

fn random_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    use rand::Rng;

    let min = h.param(0).and_then(|v| v.value().as_i64()).unwrap_or(0);
    let max = h.param(1).and_then(|v| v.value().as_i64()).unwrap_or(100);

    let mut rng = rand::thread_rng();
    let value = rng.gen_range(min..=max.max(min));
    out.write(&value.to_string())?;
    Ok(())
}

fn uuid_helper(
    _: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let uuid = format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        rng.gen::<u32>(),
        rng.gen::<u16>(),
        rng.gen::<u16>() & 0x0fff,
        (rng.gen::<u16>() & 0x3fff) | 0x8000,
        rng.gen::<u64>() & 0xffffffffffff,
    );
    out.write(&uuid)?;
    Ok(())
}
