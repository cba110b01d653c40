//! Configuration for the mock HTTP server.
//!
//! Defines the route table: URL patterns mapped to ordered response scripts.

use http::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main configuration, loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen port; a non-zero value overrides the CLI/environment port
    #[serde(default)]
    pub port: Option<u16>,

    /// Header whose value is echoed into the request log
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Configured routes
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

fn default_request_id_header() -> String {
    "X-Request-ID".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            request_id_header: default_request_id_header(),
            routes: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, route) in self.routes.iter().enumerate() {
            route
                .validate()
                .map_err(|e| anyhow::anyhow!("Route {}: {}", i, e))?;
        }
        Ok(())
    }

    /// The port to listen on, given the port selected on the command line.
    /// A non-zero `port` in the file wins over the CLI/environment value.
    pub fn effective_port(&self, cli_port: u16) -> u16 {
        match self.port {
            Some(p) if p != 0 => p,
            _ => cli_port,
        }
    }
}

/// One route: a URL pattern and the ordered responses it cycles through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// URL pattern; empty means `/`. Patterns ending in `/` match the
    /// whole subtree, all others match exactly.
    #[serde(default)]
    pub pattern: String,

    /// Scripted responses, served in order
    #[serde(default)]
    pub responses: Vec<ScriptedResponse>,
}

impl RouteConfig {
    /// The registered pattern, with the empty-string default applied.
    pub fn pattern(&self) -> &str {
        if self.pattern.is_empty() {
            "/"
        } else {
            &self.pattern
        }
    }

    /// Validate the route definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, response) in self.responses.iter().enumerate() {
            response
                .validate()
                .map_err(|e| anyhow::anyhow!("response {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// A single scripted response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedResponse {
    /// Response headers; every listed value is appended, so repeated
    /// headers are preserved
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,

    /// How many requests this response answers before the sequence moves
    /// on. Absent means it answers forever once reached; zero means it is
    /// never served.
    #[serde(default)]
    pub repeat: Option<u32>,

    /// Body source
    #[serde(default)]
    pub body: BodySource,

    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Shortcut: default `Content-Type` to `application/json` unless an
    /// explicit `Content-Type` header is configured
    #[serde(default)]
    pub is_json: bool,
}

fn default_status() -> u16 {
    200
}

impl ScriptedResponse {
    /// Validate the response definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        for (name, values) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow::anyhow!("Invalid header name {:?}: {}", name, e))?;
            for value in values {
                HeaderValue::from_str(value)
                    .map_err(|e| anyhow::anyhow!("Invalid value for header {:?}: {}", name, e))?;
            }
        }
        Ok(())
    }
}

/// Where a response body comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodySource {
    /// Fixed text, emitted as-is
    Literal { content: String },
    /// Text rendered as a template against the incoming request
    Template { content: String },
    /// File contents, re-read on every request
    File { path: String },
    /// No body bytes; status and headers only
    #[default]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_route() {
        let yaml = r#"
routes:
  - pattern: /hello
    responses:
      - status: 200
        body:
          type: literal
          content: "Hello, World!"
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].pattern(), "/hello");
        assert_eq!(config.routes[0].responses[0].status, 200);
    }

    #[test]
    fn test_parse_body_sources() {
        let yaml = r#"
routes:
  - pattern: /api/
    responses:
      - body:
          type: template
          content: "{{method}} {{path}}"
      - body:
          type: file
          path: /tmp/payload.json
      - status: 204
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        let responses = &config.routes[0].responses;

        assert!(matches!(responses[0].body, BodySource::Template { .. }));
        assert!(matches!(responses[1].body, BodySource::File { .. }));
        assert!(matches!(responses[2].body, BodySource::Empty));
        assert_eq!(responses[2].status, 204);
    }

    #[test]
    fn test_parse_repeat_and_headers() {
        let yaml = r#"
routes:
  - pattern: /login
    responses:
      - status: 503
        repeat: 2
        headers:
          Retry-After: ["1"]
          Set-Cookie: ["a=1", "b=2"]
      - status: 200
        is_json: true
        body:
          type: literal
          content: '{"ok":true}'
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        let responses = &config.routes[0].responses;

        assert_eq!(responses[0].repeat, Some(2));
        assert_eq!(responses[0].headers["Set-Cookie"].len(), 2);
        assert_eq!(responses[1].repeat, None);
        assert!(responses[1].is_json);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let yaml = "unknown_field: 1\nroutes: []\n";
        let result: Result<ServerConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_status_code() {
        let yaml = r#"
routes:
  - responses:
      - status: 99
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_header_name() {
        let yaml = r#"
routes:
  - responses:
      - headers:
          "bad header": ["x"]
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_pattern_defaults_to_root() {
        let yaml = r#"
routes:
  - responses:
      - status: 200
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.routes[0].pattern(), "/");
    }

    #[test]
    fn test_effective_port() {
        let mut config = ServerConfig::default();
        assert_eq!(config.effective_port(8080), 8080);

        config.port = Some(0);
        assert_eq!(config.effective_port(8080), 8080);

        config.port = Some(64000);
        assert_eq!(config.effective_port(8080), 64000);
    }
}
