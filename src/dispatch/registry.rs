//! Handler registry: groups of routes sharing a base path.
//!
//! Built once at startup and shared read-only with every connection task.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::dispatcher::BoundArgs;
use crate::http::request::{HttpRequest, Method};
use crate::http::response::Response;

/// Content type applied to handler responses that do not set one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// A route callable. Handlers are stateless; anything they need beyond the
/// request is captured when the closure is built.
pub type Handler = Arc<dyn Fn(&HttpRequest, &BoundArgs) -> anyhow::Result<Response> + Send + Sync>;

/// One `(sub-path, verb) -> callable` mapping inside a group.
#[derive(Clone)]
pub struct RouteEntry {
    pub sub_path: String,
    pub method: Method,
    pub handler: Handler,
    pub content_type: String,
    /// Names bound from query/form data into [`BoundArgs`] on dispatch
    pub params: Vec<String>,
}

impl RouteEntry {
    pub fn new<F>(method: Method, sub_path: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &BoundArgs) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        Self {
            sub_path: normalize_sub_path(sub_path),
            method,
            handler: Arc::new(handler),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            params: Vec::new(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn bind(mut self, names: &[&str]) -> Self {
        self.params = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Whether this entry serves `method`. HEAD is answered by GET routes.
    pub fn accepts(&self, method: Method) -> bool {
        self.method == method || (method == Method::HEAD && self.method == Method::GET)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("sub_path", &self.sub_path)
            .field("method", &self.method)
            .field("content_type", &self.content_type)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Routes sharing a base path prefix.
#[derive(Debug, Clone)]
pub struct HandlerGroup {
    base_path: String,
    routes: Vec<RouteEntry>,
}

impl HandlerGroup {
    /// `base_path` gains a leading `/` if missing; a trailing `/` is dropped.
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: normalize_base_path(base_path),
            routes: Vec::new(),
        }
    }

    pub fn route(mut self, entry: RouteEntry) -> Self {
        self.routes.push(entry);
        self
    }

    pub fn get<F>(self, sub_path: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &BoundArgs) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.route(RouteEntry::new(Method::GET, sub_path, handler))
    }

    pub fn post<F>(self, sub_path: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &BoundArgs) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.route(RouteEntry::new(Method::POST, sub_path, handler))
    }

    pub fn put<F>(self, sub_path: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &BoundArgs) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.route(RouteEntry::new(Method::PUT, sub_path, handler))
    }

    pub fn delete<F>(self, sub_path: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &BoundArgs) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.route(RouteEntry::new(Method::DELETE, sub_path, handler))
    }

    /// Normalised base path. The root group has an empty base path.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }
}

/// Ordered list of handler groups.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    groups: Vec<HandlerGroup>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: HandlerGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn groups(&self) -> &[HandlerGroup] {
        &self.groups
    }

    pub fn route_count(&self) -> usize {
        self.groups.iter().map(|g| g.routes.len()).sum()
    }
}

fn normalize_base_path(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// `""` and `"/"` both become `""`; anything else gets a leading `/`.
pub(crate) fn normalize_sub_path(sub: &str) -> String {
    let trimmed = sub.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
