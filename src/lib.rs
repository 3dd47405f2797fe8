//! skiff - a small HTTP/1.x server stack
//!
//! Parses raw connection bytes into a structured request, resolves it against
//! an explicit table of handler groups, and writes back the handler's response.
//! One request per connection.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod server;
