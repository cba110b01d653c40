//! Mock HTTP Server
//!
//! A standalone, configurable mock HTTP server: a YAML route table maps URL
//! patterns to ordered lists of scripted responses. Perfect for simulating
//! third-party APIs in tests, development, and demos.
//!
//! # Features
//!
//! - **Response Scripts**: each route cycles through an ordered response
//!   list, with per-entry repeat budgets
//! - **Body Sources**: literal text, Handlebars templates rendered against
//!   the incoming request, or files re-read on every request
//! - **Header Control**: multi-valued headers, plus a JSON content-type
//!   shortcut
//! - **Structured Logging**: one JSON log line per completed request
//!
//! # Example Configuration
//!
//! ```yaml
//! routes:
//!   - pattern: /login
//!     responses:
//!       - status: 503
//!         repeat: 2
//!         body:
//!           type: literal
//!           content: "try again"
//!       - status: 200
//!         is_json: true
//!         body:
//!           type: template
//!           content: '{"user":"{{query.user}}"}'
//! ```

pub mod config;
pub mod request;
pub mod router;
pub mod sequence;
pub mod server;
pub mod sink;
pub mod template;

pub use config::ServerConfig;
pub use server::MockServer;
