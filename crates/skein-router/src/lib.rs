//! skein-router: Zero-dependency segment trie HTTP router
//!
//! The route table behind skein-core. One trie per HTTP method, one node per
//! `/`-delimited path segment.
//!
//! ## Features
//! - O(k) lookup where k = number of path segments, independent of route count
//! - Static paths: `/users`, `/api/v1/health`
//! - Parameters: `/users/:id`, `/posts/:postId/comments/:commentId`
//! - Catch-all: `/files/*path`, `/static/*`
//! - Zero external dependencies
//!
//! ## Path Syntax
//! - `:name` - Named parameter (captures exactly one segment)
//! - `*` or `*name` - Catch-all (captures the remaining path, slashes included).
//!   Must be the last segment of the pattern.
//!
//! ## Priority
//! At every node the children are tried in this order, and the first one that
//! exists is taken:
//! 1. Exact literal match
//! 2. Parameter match
//! 3. Catch-all match
//!
//! Descent never backtracks. Once a child is chosen for a segment, a failure
//! further down is a miss, even if a sibling branch would have matched.
//!
//! Empty segments are not segments: `/users/`, `//users` and `/users` all
//! split into the single segment `users`.
//!
//! ## Example
//! ```
//! use skein_router::Router;
//!
//! let mut router = Router::new();
//! router.insert("GET", "/users", 0).unwrap();
//! router.insert("GET", "/users/:id", 1).unwrap();
//! router.insert("GET", "/files/*path", 2).unwrap();
//!
//! let m = router.find("GET", "/users/123").unwrap();
//! assert_eq!(*m.value, 1);
//! assert_eq!(m.params, vec![("id".to_string(), "123".to_string())]);
//! ```

use std::collections::HashMap;
use std::fmt;

/// Errors raised while registering a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// A `*name` segment was followed by more segments
    CatchAllNotLast { pattern: String },
    /// Two different parameter (or catch-all) names at the same position
    ConflictingWildcard {
        pattern: String,
        existing: String,
        new: String,
    },
    /// `:` with no name after it
    EmptyWildcardName { pattern: String },
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::CatchAllNotLast { pattern } => {
                write!(f, "catch-all must be the last segment in '{}'", pattern)
            }
            InsertError::ConflictingWildcard {
                pattern,
                existing,
                new,
            } => write!(
                f,
                "'{}' in '{}' conflicts with existing wildcard '{}'",
                new, pattern, existing
            ),
            InsertError::EmptyWildcardName { pattern } => {
                write!(f, "parameter without a name in '{}'", pattern)
            }
        }
    }
}

impl std::error::Error for InsertError {}

/// Route match result
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'r, T> {
    /// The matched value (usually a handler)
    pub value: &'r T,
    /// The full pattern the value was registered under
    pub pattern: &'r str,
    /// Captured path parameters as (name, value) pairs, in path order
    pub params: Vec<(String, String)>,
}

impl<T> Match<'_, T> {
    /// Get params as HashMap for convenient access
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params.iter().cloned().collect()
    }

    /// Look up a single captured parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Trie node for one path segment
#[derive(Debug, Clone)]
struct Node<T> {
    /// Literal text, or the `:name` / `*name` marker
    segment: String,
    /// True when created from a `:` or `*` segment
    is_wild: bool,
    /// Literal children keyed by segment text
    children: HashMap<String, Node<T>>,
    /// Parameter child (:id)
    param: Option<Box<Node<T>>>,
    /// Catch-all child (*path)
    catch_all: Option<Box<Node<T>>>,
    /// Present only on nodes that terminate a registered route
    value: Option<T>,
    /// The complete registered pattern, set together with `value`
    full_pattern: Option<String>,
}

impl<T> Node<T> {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            is_wild: segment.starts_with(':') || segment.starts_with('*'),
            children: HashMap::new(),
            param: None,
            catch_all: None,
            value: None,
            full_pattern: None,
        }
    }

    /// Parameter name for wildcard nodes; bare `*` is named `*`
    fn wildcard_name(&self) -> &str {
        debug_assert!(self.is_wild, "literal node has no parameter name");
        let name = &self.segment[1..];
        if name.is_empty() {
            "*"
        } else {
            name
        }
    }

    fn collect_routes(&self, method: &str, out: &mut Vec<(String, String)>) {
        if let Some(pattern) = &self.full_pattern {
            out.push((method.to_string(), pattern.clone()));
        }
        for child in self.children.values() {
            child.collect_routes(method, out);
        }
        if let Some(param) = &self.param {
            param.collect_routes(method, out);
        }
        if let Some(catch_all) = &self.catch_all {
            catch_all.collect_routes(method, out);
        }
    }
}

/// Split a path or pattern into its non-empty segments
fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Claim (or create) the wildcard slot of a node, rejecting name clashes
fn wildcard_slot<'n, T>(
    slot: &'n mut Option<Box<Node<T>>>,
    segment: &str,
    pattern: &str,
) -> Result<&'n mut Node<T>, InsertError> {
    if let Some(existing) = slot.as_ref() {
        if existing.segment != segment {
            return Err(InsertError::ConflictingWildcard {
                pattern: pattern.to_string(),
                existing: existing.segment.clone(),
                new: segment.to_string(),
            });
        }
    }
    Ok(slot.get_or_insert_with(|| Box::new(Node::new(segment))))
}

/// Segment trie HTTP router
///
/// Routes are organized by HTTP method for O(1) method dispatch,
/// then matched segment by segment.
#[derive(Debug, Clone)]
pub struct Router<T> {
    /// Method -> Trie root
    trees: HashMap<String, Node<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            trees: HashMap::new(),
        }
    }
}

impl<T> Router<T> {
    /// Create a new router
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route
    ///
    /// Re-inserting an identical (method, pattern) pair replaces the value and
    /// returns the previous one.
    ///
    /// # Example
    /// ```
    /// use skein_router::Router;
    ///
    /// let mut router = Router::new();
    /// assert_eq!(router.insert("GET", "/users/:id", "a").unwrap(), None);
    /// assert_eq!(router.insert("GET", "/users/:id", "b").unwrap(), Some("a"));
    /// assert!(router.insert("GET", "/files/*path/meta", "c").is_err());
    /// ```
    pub fn insert(&mut self, method: &str, pattern: &str, value: T) -> Result<Option<T>, InsertError> {
        let parts = segments(pattern);

        // Validate before touching the tree so a rejected pattern leaves no nodes behind
        for (i, segment) in parts.iter().enumerate() {
            if segment.starts_with('*') && i + 1 != parts.len() {
                return Err(InsertError::CatchAllNotLast {
                    pattern: pattern.to_string(),
                });
            }
            if *segment == ":" {
                return Err(InsertError::EmptyWildcardName {
                    pattern: pattern.to_string(),
                });
            }
        }

        let mut node = self
            .trees
            .entry(method.to_uppercase())
            .or_insert_with(|| Node::new(""));

        for segment in parts {
            node = if segment.starts_with(':') {
                wildcard_slot(&mut node.param, segment, pattern)?
            } else if segment.starts_with('*') {
                wildcard_slot(&mut node.catch_all, segment, pattern)?
            } else {
                node.children
                    .entry(segment.to_string())
                    .or_insert_with(|| Node::new(segment))
            };
        }

        node.full_pattern = Some(pattern.to_string());
        Ok(node.value.replace(value))
    }

    /// Find a matching route
    ///
    /// Returns `None` when no registered route matches. There is no partial
    /// match and no fallback to sibling branches.
    ///
    /// # Example
    /// ```
    /// use skein_router::Router;
    ///
    /// let mut router = Router::new();
    /// router.insert("GET", "/assets/*filepath", 0).unwrap();
    ///
    /// let m = router.find("GET", "/assets/css/a.css").unwrap();
    /// assert_eq!(m.param("filepath"), Some("css/a.css"));
    /// ```
    pub fn find(&self, method: &str, path: &str) -> Option<Match<'_, T>> {
        let mut node = self.trees.get(&method.to_uppercase())?;
        let parts = segments(path);
        let mut params = Vec::new();

        let mut i = 0;
        while i < parts.len() {
            let segment = parts[i];

            // Priority 1: exact literal
            if let Some(child) = node.children.get(segment) {
                node = child;
                i += 1;
                continue;
            }

            // Priority 2: parameter
            if let Some(param) = node.param.as_deref() {
                params.push((param.wildcard_name().to_string(), segment.to_string()));
                node = param;
                i += 1;
                continue;
            }

            // Priority 3: catch-all swallows the rest and ends descent
            if let Some(catch_all) = node.catch_all.as_deref() {
                params.push((catch_all.wildcard_name().to_string(), parts[i..].join("/")));
                node = catch_all;
                break;
            }

            return None;
        }

        match (&node.value, &node.full_pattern) {
            (Some(value), Some(pattern)) => Some(Match {
                value,
                pattern,
                params,
            }),
            _ => None,
        }
    }

    /// Check if a method has any routes registered
    pub fn has_method(&self, method: &str) -> bool {
        self.trees.contains_key(&method.to_uppercase())
    }

    /// Get all registered methods
    pub fn methods(&self) -> Vec<String> {
        self.trees.keys().cloned().collect()
    }

    /// All registered (method, pattern) pairs, sorted
    pub fn routes(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (method, tree) in &self.trees {
            tree.collect_routes(method, &mut out);
        }
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_routes() {
        let mut router = Router::new();
        router.insert("GET", "/", 0).unwrap();
        router.insert("GET", "/users", 1).unwrap();
        router.insert("GET", "/users/list", 2).unwrap();
        router.insert("POST", "/users", 3).unwrap();

        assert_eq!(*router.find("GET", "/").unwrap().value, 0);
        assert_eq!(*router.find("GET", "/users").unwrap().value, 1);
        assert_eq!(*router.find("GET", "/users/list").unwrap().value, 2);
        assert_eq!(*router.find("POST", "/users").unwrap().value, 3);
        assert!(router.find("GET", "/unknown").is_none());
        assert!(router.find("DELETE", "/users").is_none());

        let m = router.find("GET", "/users/list").unwrap();
        assert!(m.params.is_empty());
        assert_eq!(m.pattern, "/users/list");
    }

    #[test]
    fn test_intermediate_node_is_not_a_match() {
        let mut router = Router::new();
        router.insert("GET", "/a/b/c", 0).unwrap();

        assert!(router.find("GET", "/a").is_none());
        assert!(router.find("GET", "/a/b").is_none());
        assert!(router.find("GET", "/a/b/c/d").is_none());
    }

    #[test]
    fn test_param_routes() {
        let mut router = Router::new();
        router.insert("GET", "/user/:id", 1).unwrap();
        router.insert("GET", "/user/:id/posts/:post_id", 2).unwrap();

        let m = router.find("GET", "/user/42").unwrap();
        assert_eq!(*m.value, 1);
        assert_eq!(m.params, vec![("id".to_string(), "42".to_string())]);

        let m = router.find("GET", "/user/42/posts/99").unwrap();
        assert_eq!(*m.value, 2);
        assert_eq!(
            m.params,
            vec![
                ("id".to_string(), "42".to_string()),
                ("post_id".to_string(), "99".to_string()),
            ]
        );

        assert!(router.find("GET", "/user/42/extra").is_none());
    }

    #[test]
    fn test_named_catch_all() {
        let mut router = Router::new();
        router.insert("GET", "/assets/*filepath", 1).unwrap();

        let m = router.find("GET", "/assets/css/a.css").unwrap();
        assert_eq!(*m.value, 1);
        assert_eq!(
            m.params,
            vec![("filepath".to_string(), "css/a.css".to_string())]
        );

        // Nothing left to capture
        assert!(router.find("GET", "/assets").is_none());
    }

    #[test]
    fn test_bare_catch_all() {
        let mut router = Router::new();
        router.insert("GET", "/static/*", 1).unwrap();

        let m = router.find("GET", "/static/js/app.js").unwrap();
        assert_eq!(*m.value, 1);
        assert_eq!(m.params, vec![("*".to_string(), "js/app.js".to_string())]);
    }

    #[test]
    fn test_priority_literal_over_param() {
        let mut router = Router::new();
        router.insert("GET", "/users/:id", 1).unwrap();
        router.insert("GET", "/users/me", 2).unwrap();

        assert_eq!(*router.find("GET", "/users/me").unwrap().value, 2);
        assert_eq!(*router.find("GET", "/users/123").unwrap().value, 1);
    }

    #[test]
    fn test_priority_param_over_catch_all() {
        let mut router = Router::new();
        router.insert("GET", "/api/:version", 1).unwrap();
        router.insert("GET", "/api/*rest", 2).unwrap();

        assert_eq!(*router.find("GET", "/api/v1").unwrap().value, 1);
        // The param branch is taken for "v1" and dies on "users"; no fallback
        assert!(router.find("GET", "/api/v1/users").is_none());
    }

    #[test]
    fn test_catch_all_when_no_param_sibling() {
        let mut router = Router::new();
        router.insert("GET", "/api/health", 1).unwrap();
        router.insert("GET", "/api/*rest", 2).unwrap();

        assert_eq!(*router.find("GET", "/api/health").unwrap().value, 1);
        let m = router.find("GET", "/api/v1/users").unwrap();
        assert_eq!(*m.value, 2);
        assert_eq!(m.param("rest"), Some("v1/users"));
    }

    #[test]
    fn test_no_backtracking_from_literal_branch() {
        let mut router = Router::new();
        router.insert("GET", "/a/b/c", 1).unwrap();
        router.insert("GET", "/a/:x/d", 2).unwrap();

        assert_eq!(*router.find("GET", "/a/b/c").unwrap().value, 1);
        assert_eq!(*router.find("GET", "/a/z/d").unwrap().value, 2);
        // Literal "b" wins at depth 2, then "d" is missing under it
        assert!(router.find("GET", "/a/b/d").is_none());
    }

    #[test]
    fn test_reinsert_replaces_value() {
        let mut router = Router::new();
        assert_eq!(router.insert("GET", "/ping", "first").unwrap(), None);
        assert_eq!(router.insert("GET", "/ping", "second").unwrap(), Some("first"));

        assert_eq!(*router.find("GET", "/ping").unwrap().value, "second");
        assert_eq!(router.routes().len(), 1);
    }

    #[test]
    fn test_catch_all_must_be_last() {
        let mut router: Router<u32> = Router::new();
        let err = router.insert("GET", "/files/*path/meta", 1).unwrap_err();
        assert_eq!(
            err,
            InsertError::CatchAllNotLast {
                pattern: "/files/*path/meta".to_string()
            }
        );
        // Rejected pattern leaves nothing behind
        assert!(router.routes().is_empty());
    }

    #[test]
    fn test_conflicting_param_names() {
        let mut router = Router::new();
        router.insert("GET", "/users/:id", 1).unwrap();
        let err = router.insert("GET", "/users/:name/posts", 2).unwrap_err();
        assert!(matches!(err, InsertError::ConflictingWildcard { .. }));
        assert!(err.to_string().contains(":id"));

        // Same name at the same position is fine
        router.insert("GET", "/users/:id/posts", 3).unwrap();
        assert_eq!(*router.find("GET", "/users/7/posts").unwrap().value, 3);
    }

    #[test]
    fn test_empty_param_name() {
        let mut router = Router::new();
        let err = router.insert("GET", "/users/:", 1).unwrap_err();
        assert!(matches!(err, InsertError::EmptyWildcardName { .. }));
    }

    #[test]
    fn test_complex_nested_params() {
        let mut router = Router::new();
        router
            .insert("GET", "/api/v1/orgs/:orgId/teams/:teamId/members/:memberId", 1)
            .unwrap();

        let m = router
            .find("GET", "/api/v1/orgs/org1/teams/team2/members/mem3")
            .unwrap();
        assert_eq!(*m.value, 1);
        let map = m.params_map();
        assert_eq!(map.get("orgId"), Some(&"org1".to_string()));
        assert_eq!(map.get("teamId"), Some(&"team2".to_string()));
        assert_eq!(map.get("memberId"), Some(&"mem3".to_string()));
    }

    #[test]
    fn test_methods() {
        let mut router = Router::new();
        router.insert("GET", "/users", 1).unwrap();
        router.insert("POST", "/users", 2).unwrap();
        router.insert("DELETE", "/users/:id", 3).unwrap();

        assert!(router.has_method("GET"));
        assert!(router.has_method("post"));
        assert!(!router.has_method("PUT"));

        let methods = router.methods();
        assert_eq!(methods.len(), 3);
        assert!(methods.contains(&"DELETE".to_string()));

        assert_eq!(
            router.routes(),
            vec![
                ("DELETE".to_string(), "/users/:id".to_string()),
                ("GET".to_string(), "/users".to_string()),
                ("POST".to_string(), "/users".to_string()),
            ]
        );
    }

    #[test]
    fn test_case_insensitive_method() {
        let mut router = Router::new();
        router.insert("get", "/users", 1).unwrap();

        assert_eq!(*router.find("GET", "/users").unwrap().value, 1);
        assert_eq!(*router.find("Get", "/users").unwrap().value, 1);
    }

    #[test]
    fn test_empty_segments_are_dropped() {
        let mut router = Router::new();
        router.insert("GET", "/users/", 1).unwrap();

        assert_eq!(*router.find("GET", "/users").unwrap().value, 1);
        assert_eq!(*router.find("GET", "//users//").unwrap().value, 1);
    }
}
