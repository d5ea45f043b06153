//! Engine and dispatcher
//!
//! [`Engine`] is the registration-phase object: it owns the root group and
//! every group derived from it. [`Engine::build`] freezes what has been
//! registered into a [`Dispatcher`], an immutable snapshot that request
//! tasks share through an `Arc`. Registration after `build` only affects
//! dispatchers built later.

use crate::context::{ChainFlow, Context, Handler};
use crate::group::{Registry, RouteMiss, RouterGroup};
use crate::middleware::{logger, recovery};
use crate::router::{RouteMatch, RouteTable};
use crate::{Method, Request, Response, Result};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

/// Registration-phase entry point
#[derive(Debug, Clone)]
pub struct Engine {
    root: RouterGroup,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with no middleware
    pub fn new() -> Self {
        Self {
            root: RouterGroup::root(Arc::new(RwLock::new(Registry::new()))),
        }
    }

    /// An engine with request logging and panic recovery on the root group
    pub fn with_defaults() -> Self {
        let engine = Self::new();
        engine.use_middleware([logger(), recovery()]);
        engine
    }

    /// The root group (empty prefix)
    pub fn root(&self) -> &RouterGroup {
        &self.root
    }

    pub fn group(&self, prefix: &str) -> RouterGroup {
        self.root.group(prefix)
    }

    pub fn use_middleware<I>(&self, middleware: I) -> &Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.root.use_middleware(middleware);
        self
    }

    pub fn handle(&self, method: Method, pattern: &str, handler: Option<Handler>) -> Result<()> {
        self.root.handle(method, pattern, handler)
    }

    pub fn get(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.root.get(pattern, handler)
    }

    pub fn post(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.root.post(pattern, handler)
    }

    pub fn put(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.root.put(pattern, handler)
    }

    pub fn delete(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.root.delete(pattern, handler)
    }

    pub fn patch(&self, pattern: &str, handler: Handler) -> Result<()> {
        self.root.patch(pattern, handler)
    }

    pub fn static_files(&self, relative: &str, root: impl Into<PathBuf>) -> Result<()> {
        self.root.static_files(relative, root)
    }

    /// Run `handler` when no route matches
    pub fn not_found(&self, handler: Handler) -> &Self {
        self.root.registry().write().miss = RouteMiss::Handler(handler);
        self
    }

    /// On a route miss run only the middleware, with no terminal handler
    pub fn silent_route_miss(&self) -> &Self {
        self.root.registry().write().miss = RouteMiss::Silent;
        self
    }

    /// Choose what a handler returning without `next()` means
    pub fn chain_flow(&self, flow: ChainFlow) -> &Self {
        self.root.registry().write().flow = flow;
        self
    }

    /// Freeze the current registration state
    pub fn build(&self) -> Dispatcher {
        let registry = self.root.registry().read();
        let groups = registry
            .groups
            .iter()
            .map(|g| GroupSnapshot {
                prefix: g.prefix.clone(),
                middleware: g.middleware.clone(),
            })
            .collect();

        Dispatcher {
            inner: Arc::new(Snapshot {
                groups,
                routes: registry.routes.clone(),
                miss: registry.miss.clone(),
                flow: registry.flow,
            }),
        }
    }
}

struct GroupSnapshot {
    prefix: String,
    middleware: Vec<Handler>,
}

struct Snapshot {
    /// Registration order, root first
    groups: Vec<GroupSnapshot>,
    routes: RouteTable,
    miss: RouteMiss,
    flow: ChainFlow,
}

/// Immutable routing and middleware snapshot, cheap to clone into request tasks
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Snapshot>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("groups", &self.inner.groups.len())
            .field("routes", &self.inner.routes)
            .field("miss", &self.inner.miss)
            .field("flow", &self.inner.flow)
            .finish()
    }
}

impl Dispatcher {
    /// Middleware of every group whose prefix is a string prefix of `path`,
    /// in group registration order
    pub fn middleware_for(&self, path: &str) -> Vec<Handler> {
        self.inner
            .groups
            .iter()
            .filter(|g| path.starts_with(&g.prefix))
            .flat_map(|g| g.middleware.iter().cloned())
            .collect()
    }

    /// Look up the terminal handler for a request line
    pub fn resolve(&self, method: Method, path: &str) -> Option<RouteMatch> {
        self.inner.routes.find(method, path)
    }

    /// Registered (method, pattern) pairs, sorted
    pub fn routes(&self) -> Vec<(String, String)> {
        self.inner.routes.routes()
    }

    /// Run the full chain for `request` and return the finished context
    pub fn dispatch(&self, request: Request) -> Context {
        let middleware = self.middleware_for(&request.path);
        let method = request.method;
        let path = request.path.clone();
        let mut c = Context::with_chain(request, middleware, self.inner.flow);

        match self.resolve(method, &path) {
            Some(matched) => {
                c.set_route(matched.pattern, matched.params);
                c.push_handler(matched.handler);
            }
            None => match &self.inner.miss {
                RouteMiss::Silent => {
                    tracing::debug!(%method, %path, "no route matched, running middleware only");
                }
                RouteMiss::Handler(handler) => c.push_handler(handler.clone()),
            },
        }

        c.next();
        c
    }

    /// Run the full chain for `request` and return the response
    pub fn serve(&self, request: Request) -> Response {
        self.dispatch(request).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::handler;
    use crate::{RequestBuilder, StatusCode};
    use parking_lot::Mutex;

    fn get(path: &str) -> Request {
        RequestBuilder::new(Method::Get, path).build()
    }

    fn marker(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Handler {
        let log = log.clone();
        handler(move |c| {
            log.lock().push(name);
            c.next();
        })
    }

    #[test]
    fn test_group_middleware_applies_by_prefix() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Engine::new();
        let api = engine.group("/api");
        api.use_middleware([marker(&log, "M")]);
        api.get("/widgets", handler(|c| c.string(200, "api")))
            .unwrap();
        engine
            .get("/other/widgets", handler(|c| c.string(200, "other")))
            .unwrap();
        let dispatcher = engine.build();

        assert_eq!(dispatcher.serve(get("/api/widgets")).body_string().as_deref(), Some("api"));
        assert_eq!(*log.lock(), vec!["M"]);

        assert_eq!(
            dispatcher.serve(get("/other/widgets")).body_string().as_deref(),
            Some("other")
        );
        assert_eq!(*log.lock(), vec!["M"]);
    }

    #[test]
    fn test_middleware_order_follows_group_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Engine::new();
        let api = engine.group("/api");
        let v1 = api.group("/v1");
        // Registered on the parent after the child exists; group order still decides
        v1.use_middleware([marker(&log, "v1")]);
        api.use_middleware([marker(&log, "api")]);
        engine.use_middleware([marker(&log, "root")]);
        v1.get("/x", handler(|_| {})).unwrap();

        engine.build().serve(get("/api/v1/x"));
        assert_eq!(*log.lock(), vec!["root", "api", "v1"]);
    }

    #[test]
    fn test_string_prefix_not_segment_prefix() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Engine::new();
        engine.group("/api").use_middleware([marker(&log, "api")]);
        engine.get("/apiary", handler(|_| {})).unwrap();

        engine.build().serve(get("/apiary"));
        assert_eq!(*log.lock(), vec!["api"]);
    }

    #[test]
    fn test_params_reach_handler() {
        let engine = Engine::new();
        engine
            .get(
                "/user/:id",
                handler(|c| {
                    let id = c.param("id").to_string();
                    c.string(200, id);
                }),
            )
            .unwrap();

        let res = engine.build().serve(get("/user/42"));
        assert_eq!(res.body_string().as_deref(), Some("42"));
    }

    #[test]
    fn test_default_route_miss_is_404() {
        let engine = Engine::new();
        let res = engine.build().serve(get("/missing"));

        assert_eq!(res.status, StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&res.body).unwrap();
        assert_eq!(body["message"], "404 NOT FOUND: /missing");
    }

    #[test]
    fn test_silent_route_miss_runs_middleware_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Engine::new();
        engine.silent_route_miss();
        engine.use_middleware([marker(&log, "root")]);

        let c = engine.build().dispatch(get("/missing"));
        assert_eq!(c.chain_len(), 1);
        assert_eq!(*log.lock(), vec!["root"]);

        let res = c.into_response();
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.is_empty());
    }

    #[test]
    fn test_custom_not_found() {
        let engine = Engine::new();
        engine.not_found(handler(|c| c.string(404, "nothing here")));

        let res = engine.build().serve(get("/missing"));
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body_string().as_deref(), Some("nothing here"));
    }

    #[test]
    fn test_placeholder_route_answers_success() {
        let engine = Engine::new();
        engine.handle(Method::Post, "/todo", None).unwrap();

        let res = engine
            .build()
            .serve(RequestBuilder::new(Method::Post, "/todo").build());
        assert_eq!(res.status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&res.body).unwrap();
        assert_eq!(body["message"], "success");
    }

    #[test]
    fn test_snapshot_ignores_later_registration() {
        let engine = Engine::new();
        engine.get("/a", handler(|c| c.string(200, "a"))).unwrap();
        let before = engine.build();
        engine.get("/b", handler(|c| c.string(200, "b"))).unwrap();
        let after = engine.build();

        assert_eq!(before.serve(get("/b")).status, StatusCode::NOT_FOUND);
        assert_eq!(after.serve(get("/b")).status, StatusCode::OK);
        assert_eq!(before.routes().len(), 1);
        assert_eq!(after.routes().len(), 2);
    }

    #[test]
    fn test_with_defaults_recovers_panics() {
        let engine = Engine::with_defaults();
        engine.get("/boom", handler(|_| panic!("boom"))).unwrap();

        let res = engine.build().serve(get("/boom"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_static_route_through_dispatcher() {
        let dir = std::env::temp_dir().join(format!("skein-engine-static-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("css")).unwrap();
        std::fs::write(dir.join("css/a.css"), "body{}").unwrap();
        std::fs::write(dir.join("index.html"), "<h1>home</h1>").unwrap();

        let engine = Engine::new();
        engine.static_files("/assets", &dir).unwrap();
        engine
            .get("/assets/health", handler(|c| c.string(200, "healthy")))
            .unwrap();
        let dispatcher = engine.build();

        let res = dispatcher.serve(get("/assets/css/a.css"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some("text/css; charset=utf-8"));
        assert_eq!(res.body_string().as_deref(), Some("body{}"));

        // Literal beats the catch-all
        let res = dispatcher.serve(get("/assets/health"));
        assert_eq!(res.body_string().as_deref(), Some("healthy"));

        let res = dispatcher.serve(get("/assets/missing"));
        assert_eq!(res.status, StatusCode::NOT_FOUND);

        let res = dispatcher.serve(get("/assets"));
        assert_eq!(res.body_string().as_deref(), Some("<h1>home</h1>"));

        let res = dispatcher.serve(RequestBuilder::new(Method::Head, "/assets/css/a.css").build());
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.header("content-length"), Some("6"));
        assert!(res.body.is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_implicit_flow_engine() {
        let engine = Engine::new();
        engine.chain_flow(ChainFlow::Implicit);
        engine.use_middleware([handler(|c| c.set_header("x-seen", "1"))]);
        engine.get("/", handler(|c| c.string(200, "root"))).unwrap();

        let res = engine.build().serve(get("/"));
        assert_eq!(res.header("x-seen"), Some("1"));
        assert_eq!(res.body_string().as_deref(), Some("root"));
    }
}
