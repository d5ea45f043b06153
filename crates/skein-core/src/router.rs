//! Route table
//!
//! Thin typed layer over `skein_router`: keys the tries by [`Method`], stores
//! [`Handler`]s, and hands back captured parameters as a map.

use crate::context::Handler;
use crate::{Method, Result};
use std::collections::HashMap;

/// Route match result
#[derive(Clone)]
pub struct RouteMatch {
    /// The matched handler
    pub handler: Handler,
    /// The pattern it was registered under
    pub pattern: String,
    /// Captured path parameters
    pub params: HashMap<String, String>,
}

/// Per-method route tries
#[derive(Default, Clone)]
pub struct RouteTable {
    inner: skein_router::Router<Handler>,
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.inner.routes())
            .finish()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; returns true when an earlier handler was replaced
    pub fn insert(&mut self, method: Method, pattern: &str, handler: Handler) -> Result<bool> {
        let previous = self.inner.insert(method.as_str(), pattern, handler)?;
        Ok(previous.is_some())
    }

    /// Resolve a request path
    pub fn find(&self, method: Method, path: &str) -> Option<RouteMatch> {
        self.inner.find(method.as_str(), path).map(|m| RouteMatch {
            handler: m.value.clone(),
            pattern: m.pattern.to_string(),
            params: m.params_map(),
        })
    }

    /// Registered (method, pattern) pairs, sorted
    pub fn routes(&self) -> Vec<(String, String)> {
        self.inner.routes()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.methods().is_empty()
    }
}
