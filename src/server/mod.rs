//! Accept loop and the shared per-process state handed to each connection.

pub mod listener;
pub mod static_files;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::dispatch::{Dispatcher, Registry};
use crate::http::parser::ParseOptions;
use static_files::StaticFiles;

/// Read-only state shared by every connection task.
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub dispatcher: Dispatcher,
    pub static_files: StaticFiles,
    pub parse_options: ParseOptions,
    pub read_timeout: Duration,
    pub max_head_bytes: usize,
    pub max_body_bytes: usize,
}

impl ServerContext {
    pub fn new(cfg: &Config, registry: Arc<Registry>) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry, cfg.dispatch.method_policy)
                .lowercase_paths(cfg.parsing.lowercase_path),
            static_files: StaticFiles::from_config(&cfg.static_files),
            parse_options: cfg.parsing.options(),
            read_timeout: cfg.server.read_timeout(),
            max_head_bytes: cfg.server.max_head_bytes,
            max_body_bytes: cfg.server.max_body_bytes,
        }
    }
}
