//! Handler registry and dispatch.
//!
//! Handlers are registered explicitly as closures grouped under a base path; the
//! dispatcher resolves a parsed request against that table and hands back the
//! matched route for invocation.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{BoundArgs, DispatchResult, Dispatcher, MatchedRoute, MethodPolicy};
pub use registry::{Handler, HandlerGroup, Registry, RouteEntry};
