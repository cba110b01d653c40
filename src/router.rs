//! Route pattern matching.
//!
//! Patterns follow the subtree convention: a pattern ending in `/` matches
//! every path below it, any other pattern matches exactly, and the longest
//! matching pattern wins.

use crate::config::RouteConfig;
use crate::sequence::RouteSequencer;
use crate::template::TemplateEngine;
use std::sync::Arc;

struct RegisteredRoute {
    pattern: String,
    sequencer: RouteSequencer,
}

/// Dispatch table mapping URL patterns to their sequencers.
pub struct Router {
    routes: Vec<RegisteredRoute>,
}

impl Router {
    /// Build the dispatch table. Every route gets its own sequencer; the
    /// template engine is shared.
    pub fn new(routes: Vec<RouteConfig>, engine: Arc<TemplateEngine>) -> Self {
        let routes = routes
            .into_iter()
            .map(|route| {
                let pattern = route.pattern().to_string();
                RegisteredRoute {
                    pattern,
                    sequencer: RouteSequencer::new(route.responses, Arc::clone(&engine)),
                }
            })
            .collect();

        Self { routes }
    }

    /// Find the sequencer for a request path, if any pattern matches.
    pub fn lookup(&self, path: &str) -> Option<&RouteSequencer> {
        self.routes
            .iter()
            .filter(|route| pattern_matches(&route.pattern, path))
            .max_by_key(|route| route.pattern.len())
            .map(|route| &route.sequencer)
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('/') {
        // Subtree pattern: `/images/` matches `/images`, `/images/` and
        // everything below
        path == prefix || path.starts_with(pattern)
    } else {
        path == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptedResponse;
    use std::collections::HashMap;

    fn route(pattern: &str) -> RouteConfig {
        RouteConfig {
            pattern: pattern.to_string(),
            responses: vec![ScriptedResponse {
                headers: HashMap::new(),
                repeat: None,
                body: crate::config::BodySource::Empty,
                status: 200,
                is_json: false,
            }],
        }
    }

    fn router(patterns: &[&str]) -> Router {
        Router::new(
            patterns.iter().map(|p| route(p)).collect(),
            Arc::new(TemplateEngine::new()),
        )
    }

    #[test]
    fn test_exact_match() {
        let router = router(&["/hello"]);
        assert!(router.lookup("/hello").is_some());
        assert!(router.lookup("/hello/there").is_none());
        assert!(router.lookup("/").is_none());
    }

    #[test]
    fn test_subtree_match() {
        let router = router(&["/api/"]);
        assert!(router.lookup("/api/").is_some());
        assert!(router.lookup("/api/users/42").is_some());
        assert!(router.lookup("/api").is_some());
        assert!(router.lookup("/apix").is_none());
    }

    #[test]
    fn test_longest_pattern_wins() {
        let router = Router::new(
            vec![route("/"), route("/api/"), route("/api/users")],
            Arc::new(TemplateEngine::new()),
        );

        // Each registered route has its own sequencer, so identity tells
        // us which pattern was selected
        let by_users = router.lookup("/api/users").unwrap() as *const _;
        let by_api = router.lookup("/api/other").unwrap() as *const _;
        let by_root = router.lookup("/misc").unwrap() as *const _;

        assert_ne!(by_users, by_api);
        assert_ne!(by_api, by_root);
        assert_ne!(by_users, by_root);
    }

    #[test]
    fn test_root_matches_everything() {
        let router = router(&["/"]);
        assert!(router.lookup("/").is_some());
        assert!(router.lookup("/anything/at/all").is_some());
    }

    #[test]
    fn test_empty_router() {
        let router = router(&[]);
        assert!(router.is_empty());
        assert!(router.lookup("/").is_none());
    }

    #[test]
    fn test_empty_pattern_registers_root() {
        let router = router(&[""]);
        assert!(router.lookup("/whatever").is_some());
    }
}
