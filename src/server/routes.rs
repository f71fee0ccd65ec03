use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{tunnel_handler, tunnel_page_handler, AppState};
use crate::tunnel::Dispatcher;

/// Batches posted by the client can be large (bulk imports), so the body limit is raised.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// URL path the tunnel answers on.
    pub path: String,
    pub max_body_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl RouterOptions {
    /// Path with a guaranteed leading slash.
    pub fn normalized_path(&self) -> String {
        let trimmed = self.path.trim();
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }
}

pub fn create_router(dispatcher: Dispatcher, options: RouterOptions) -> Router {
    let state = AppState {
        dispatcher: Arc::new(dispatcher),
    };

    Router::new()
        .route(
            &options.normalized_path(),
            get(tunnel_page_handler).post(tunnel_handler),
        )
        .layer(DefaultBodyLimit::max(options.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_path() {
        let options = RouterOptions {
            path: "ntunnel_mysql.php".into(),
            ..Default::default()
        };
        assert_eq!(options.normalized_path(), "/ntunnel_mysql.php");
        assert_eq!(RouterOptions::default().normalized_path(), "/");
    }
}
