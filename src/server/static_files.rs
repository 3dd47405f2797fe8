//! Static resources served from a directory under a reserved path prefix.
//!
//! Requests under the prefix never reach the dispatcher.

use std::path::{Component, Path, PathBuf};

use crate::config::StaticFilesConfig;
use crate::http::mime;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

#[derive(Debug, Clone)]
pub struct StaticFiles {
    prefix: String,
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            root: root.into(),
        }
    }

    pub fn from_config(cfg: &StaticFilesConfig) -> Self {
        Self::new(cfg.prefix.clone(), cfg.root.clone())
    }

    /// True for the prefix itself and anything below it.
    pub fn handles(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Maps a request path to a file under the root. `None` when the path tries
    /// to leave the root or names no file.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rest = path.strip_prefix(self.prefix.as_str())?.trim_start_matches('/');
        if rest.is_empty() {
            return None;
        }

        let relative = Path::new(rest);
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return None;
        }

        Some(self.root.join(relative))
    }

    pub async fn serve(&self, path: &str) -> Response {
        let Some(file) = self.resolve(path) else {
            tracing::debug!(path = %path, "Rejected static path");
            return Response::not_found();
        };

        match tokio::fs::read(&file).await {
            Ok(data) => ResponseBuilder::new(StatusCode::Ok)
                .header("Content-Type", mime::from_path(&file))
                .body(data)
                .build(),
            Err(e) => {
                tracing::debug!(file = %file.display(), error = %e, "Static file unavailable");
                Response::not_found()
            }
        }
    }
}
