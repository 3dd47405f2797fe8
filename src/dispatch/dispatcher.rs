//! Request to handler resolution.
//!
//! Resolution is two-level. First a handler group is chosen by base-path prefix:
//! the longest matching base path wins, and among equal base paths the one
//! registered first. The prefix is then stripped and the remainder must equal a
//! route's sub-path exactly (no wildcards, no path parameters).
//!
//! When the parser lower-cases request paths, [`Dispatcher::lowercase_paths`]
//! makes both comparisons ASCII case-insensitive so mixed-case registrations
//! stay reachable.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::dispatch::registry::{HandlerGroup, Registry, RouteEntry};
use crate::http::request::{HttpRequest, Method};
use crate::http::response::Response;

/// Which verbs the dispatcher is willing to serve at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodPolicy {
    /// Only GET and HEAD; everything else is answered as not implemented.
    #[default]
    ReadOnly,
    /// Any parsed method may be routed.
    AllVerbs,
}

impl MethodPolicy {
    pub fn allows(&self, method: Method) -> bool {
        match self {
            MethodPolicy::ReadOnly => matches!(method, Method::GET | Method::HEAD),
            MethodPolicy::AllVerbs => true,
        }
    }
}

/// Named values bound from the request for a matched route.
///
/// Each name the route declares is looked up in the query parameters, then in
/// the body attributes. Names with no value in either are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArgs {
    values: HashMap<String, String>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn bind(route: &RouteEntry, request: &HttpRequest) -> Self {
        let values = route
            .params
            .iter()
            .filter_map(|name| {
                request
                    .parameter(name)
                    .or_else(|| request.attribute(name))
                    .map(|v| (name.clone(), v.to_string()))
            })
            .collect();
        Self { values }
    }
}

/// A resolved route, ready to invoke.
#[derive(Debug)]
pub struct MatchedRoute<'a> {
    pub group: &'a HandlerGroup,
    pub route: &'a RouteEntry,
    /// Request path with the group's base path removed
    pub sub_path: String,
    pub args: BoundArgs,
}

impl MatchedRoute<'_> {
    /// Calls the route's handler. The route's declared content type is applied
    /// when the handler's response has none.
    pub fn invoke(&self, request: &HttpRequest) -> anyhow::Result<Response> {
        let mut response = (self.route.handler)(request, &self.args)?;
        if response.header("Content-Type").is_none() {
            response.set_header("Content-Type", self.route.content_type.clone());
        }
        Ok(response)
    }
}

#[derive(Debug)]
pub enum DispatchResult<'a> {
    Matched(MatchedRoute<'a>),
    /// The method policy rejected the request before any matching.
    MethodNotImplemented,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    policy: MethodPolicy,
    lowercase_paths: bool,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, policy: MethodPolicy) -> Self {
        Self {
            registry,
            policy,
            lowercase_paths: false,
        }
    }

    /// Matches base and sub-paths ignoring ASCII case.
    pub fn lowercase_paths(mut self, enabled: bool) -> Self {
        self.lowercase_paths = enabled;
        self
    }

    pub fn policy(&self) -> MethodPolicy {
        self.policy
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn resolve<'a>(&'a self, request: &HttpRequest) -> DispatchResult<'a> {
        let method = request.method();
        if !self.policy.allows(method) {
            tracing::debug!(method = %method, policy = ?self.policy, "Method rejected by policy");
            return DispatchResult::MethodNotImplemented;
        }

        let path = request.path();
        let Some(group) = self.select_group(path) else {
            tracing::debug!(path = %path, "No handler group matches");
            return DispatchResult::NotFound;
        };

        let rest = path.get(group.base_path().len()..).unwrap_or("");
        let sub_path = if rest == "/" { "" } else { rest };

        let Some(route) = group
            .routes()
            .iter()
            .find(|r| self.same_path(&r.sub_path, sub_path) && r.accepts(method))
        else {
            tracing::debug!(
                base_path = group.base_path(),
                sub_path = %sub_path,
                method = %method,
                "No route in group matches"
            );
            return DispatchResult::NotFound;
        };

        DispatchResult::Matched(MatchedRoute {
            group,
            route,
            sub_path: sub_path.to_string(),
            args: BoundArgs::bind(route, request),
        })
    }

    fn select_group(&self, path: &str) -> Option<&HandlerGroup> {
        self.registry
            .groups()
            .iter()
            .filter(|g| self.has_prefix(path, g.base_path()))
            .fold(None, |best: Option<&HandlerGroup>, g| match best {
                Some(b) if b.base_path().len() >= g.base_path().len() => Some(b),
                _ => Some(g),
            })
    }

    fn has_prefix(&self, path: &str, base: &str) -> bool {
        match path.as_bytes().get(..base.len()) {
            Some(head) if self.lowercase_paths => head.eq_ignore_ascii_case(base.as_bytes()),
            Some(head) => head == base.as_bytes(),
            None => false,
        }
    }

    fn same_path(&self, registered: &str, requested: &str) -> bool {
        if self.lowercase_paths {
            registered.eq_ignore_ascii_case(requested)
        } else {
            registered == requested
        }
    }
}
