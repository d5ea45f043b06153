//! Route groups
//!
//! A group is a path prefix plus an ordered list of middleware. Groups are
//! cheap handles into the registry they were derived from, so several can be
//! held and configured at once during startup. Everything registered here is
//! frozen into a [`crate::Dispatcher`] snapshot before serving.

use crate::context::{handler, ChainFlow, Handler};
use crate::handlers::StaticFiles;
use crate::router::RouteTable;
use crate::{Method, Result};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

/// What the dispatcher does when no route matches
#[derive(Clone)]
pub enum RouteMiss {
    /// Run only the collected middleware; the response is whatever they write
    Silent,
    /// Append this handler in place of the missing route
    Handler(Handler),
}

impl std::fmt::Debug for RouteMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteMiss::Silent => f.write_str("Silent"),
            RouteMiss::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl Default for RouteMiss {
    fn default() -> Self {
        RouteMiss::Handler(handler(|c| {
            let message = format!("404 NOT FOUND: {}", c.path());
            c.fail(404, message);
        }))
    }
}

pub(crate) struct GroupData {
    pub(crate) prefix: String,
    pub(crate) middleware: Vec<Handler>,
    /// Index of the parent group, lookup only
    pub(crate) parent: Option<usize>,
}

/// Registration-time state shared by an engine and all of its groups
#[derive(Default)]
pub(crate) struct Registry {
    /// Groups in registration order; index 0 is the root
    pub(crate) groups: Vec<GroupData>,
    pub(crate) routes: RouteTable,
    pub(crate) miss: RouteMiss,
    pub(crate) flow: ChainFlow,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            groups: vec![GroupData {
                prefix: String::new(),
                middleware: Vec::new(),
                parent: None,
            }],
            ..Default::default()
        }
    }
}

/// Handler substituted when a route is registered without one
fn success_handler() -> Handler {
    handler(|c| c.json(200, &serde_json::json!({ "message": "success" })))
}

/// Handle to one route group
#[derive(Clone)]
pub struct RouterGroup {
    id: usize,
    registry: Arc<RwLock<Registry>>,
}

impl std::fmt::Debug for RouterGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterGroup")
            .field("id", &self.id)
            .field("prefix", &self.prefix())
            .finish()
    }
}

impl RouterGroup {
    pub(crate) fn root(registry: Arc<RwLock<Registry>>) -> Self {
        Self { id: 0, registry }
    }

    /// Effective prefix (all ancestor prefixes concatenated)
    pub fn prefix(&self) -> String {
        self.registry.read().groups[self.id].prefix.clone()
    }

    /// The group this one was derived from; `None` for the root
    pub fn parent(&self) -> Option<RouterGroup> {
        self.registry.read().groups[self.id]
            .parent
            .map(|id| RouterGroup {
                id,
                registry: self.registry.clone(),
            })
    }

    /// Number of middleware registered on this group
    pub fn middleware_len(&self) -> usize {
        self.registry.read().groups[self.id].middleware.len()
    }

    /// Derive a subgroup whose prefix is this group's prefix + `prefix`.
    ///
    /// Prefixes are not checked for uniqueness; overlapping groups all apply.
    pub fn group(&self, prefix: &str) -> RouterGroup {
        let mut registry = self.registry.write();
        let prefix = format!("{}{}", registry.groups[self.id].prefix, prefix);
        tracing::debug!(prefix = %prefix, "group created");
        registry.groups.push(GroupData {
            prefix,
            middleware: Vec::new(),
            parent: Some(self.id),
        });
        RouterGroup {
            id: registry.groups.len() - 1,
            registry: self.registry.clone(),
        }
    }

    /// Append middleware, preserving order
    pub fn use_middleware<I>(&self, middleware: I) -> &Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.registry.write().groups[self.id]
            .middleware
            .extend(middleware);
        self
    }

    /// Register `handler` (or the default success handler) for `method` at
    /// this group's prefix + `pattern`. Re-registering replaces silently.
    pub fn handle(&self, method: Method, pattern: &str, handler: Option<Handler>) -> Result<()> {
        let mut registry = self.registry.write();
        let full = format!("{}{}", registry.groups[self.id].prefix, pattern);
        let handler = handler.unwrap_or_else(success_handler);
        let replaced = registry.routes.insert(method, &full, handler)?;
        if replaced {
            tracing::debug!(method = %method, pattern = %full, "route replaced");
        } else {
            tracing::debug!(method = %method, pattern = %full, "route registered");
        }
        Ok(())
    }

    pub fn get(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.handle(Method::Get, pattern, Some(handler))
    }

    pub fn post(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.handle(Method::Post, pattern, Some(handler))
    }

    pub fn put(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.handle(Method::Put, pattern, Some(handler))
    }

    pub fn delete(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.handle(Method::Delete, pattern, Some(handler))
    }

    pub fn patch(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.handle(Method::Patch, pattern, Some(handler))
    }

    pub fn head(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.handle(Method::Head, pattern, Some(handler))
    }

    pub fn options(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.handle(Method::Options, pattern, Some(handler))
    }

    /// Serve files under `root` for GET and HEAD at `relative/*filepath`,
    /// and the directory index at `relative` itself.
    ///
    /// The routes compete with every other route under the usual priority rules.
    pub fn static_files(&self, relative: &str, root: impl Into<PathBuf>) -> Result<()> {
        let files = Arc::new(StaticFiles::serve(root));
        let serve = handler(move |c| {
            let response = files.handle(c.method(), c.param("filepath"), c.request());
            c.write_response(response);
        });

        let base = relative.trim_end_matches('/');
        let pattern = format!("{}/*filepath", base);
        for method in [Method::Get, Method::Head] {
            self.handle(method, &pattern, Some(serve.clone()))?;
            self.handle(method, base, Some(serve.clone()))?;
        }
        Ok(())
    }

    pub(crate) fn registry(&self) -> &Arc<RwLock<Registry>> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> RouterGroup {
        RouterGroup::root(Arc::new(RwLock::new(Registry::new())))
    }

    #[test]
    fn test_nested_prefixes() {
        let root = root();
        let api = root.group("/api");
        let v1 = api.group("/v1");

        assert_eq!(root.prefix(), "");
        assert_eq!(api.prefix(), "/api");
        assert_eq!(v1.prefix(), "/api/v1");
        assert_eq!(v1.parent().unwrap().prefix(), "/api");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_routes_get_group_prefix() {
        let root = root();
        let api = root.group("/api");
        api.get("/widgets/:id", handler(|_| {})).unwrap();
        api.handle(Method::Post, "/widgets", None).unwrap();

        let registry = root.registry().read();
        assert_eq!(
            registry.routes.routes(),
            vec![
                ("GET".to_string(), "/api/widgets/:id".to_string()),
                ("POST".to_string(), "/api/widgets".to_string()),
            ]
        );
    }

    #[test]
    fn test_use_appends_in_order() {
        let root = root();
        let api = root.group("/api");
        api.use_middleware([handler(|_| {})])
            .use_middleware([handler(|_| {}), handler(|_| {})]);

        assert_eq!(api.middleware_len(), 3);
        assert_eq!(root.middleware_len(), 0);
    }

    #[test]
    fn test_duplicate_prefixes_allowed() {
        let root = root();
        let a = root.group("/dup");
        let b = root.group("/dup");
        a.use_middleware([handler(|_| {})]);

        assert_eq!(a.prefix(), b.prefix());
        assert_eq!(b.middleware_len(), 0);
        assert_eq!(root.registry().read().groups.len(), 3);
    }

    #[test]
    fn test_static_pattern() {
        let root = root();
        root.group("/site").static_files("/assets/", ".").unwrap();

        let registry = root.registry().read();
        assert_eq!(
            registry.routes.routes(),
            vec![
                ("GET".to_string(), "/site/assets".to_string()),
                ("GET".to_string(), "/site/assets/*filepath".to_string()),
                ("HEAD".to_string(), "/site/assets".to_string()),
                ("HEAD".to_string(), "/site/assets/*filepath".to_string()),
            ]
        );
    }
}
