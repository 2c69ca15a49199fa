//! HTTP front end
//!
//! Redirects `GET /{group}/https://<origin>/<path>` to the mirror currently
//! selected for the group and exposes health and metrics endpoints.
//!
//! # Routes
//!
//! ```text
//! GET /{group}/{*path}   301 to the selected mirror, 503 until one is selected
//! GET /health/live       liveness
//! GET /health/ready      503 until some group has a mirror
//! GET /health            per-group selection details
//! GET /metrics           Prometheus exposition
//! ```

pub mod api;
pub mod health;
pub mod redirect;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{RedirectConfig, ServerConfig};
use crate::selection::SelectionStore;

pub use api::create_router;
pub use health::{create_health_router, HealthStatus};
pub use redirect::{build_redirect_uri, extract_domain_and_path};

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Current selection of every group
    pub store: Arc<SelectionStore>,

    /// Configured group names
    pub groups: Arc<Vec<String>>,

    /// Redirect URI construction
    pub redirect: Arc<RedirectConfig>,

    /// Seconds advertised in `Retry-After`
    pub retry_after_secs: u64,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<SelectionStore>,
        groups: Vec<String>,
        redirect: RedirectConfig,
        retry_after_secs: u64,
    ) -> Self {
        Self {
            store,
            groups: Arc::new(groups),
            redirect: Arc::new(redirect),
            retry_after_secs,
            start_time: Instant::now(),
        }
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

// ============================================================================
// Mirror Server
// ============================================================================

/// HTTP server redirecting to the selected mirrors
pub struct MirrorServer {
    config: ServerConfig,
    state: AppState,
}

impl MirrorServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router =
            create_health_router(self.state.clone()).merge(create_router(self.state.clone()));

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.config.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("{addr}: {e}")))?;

        tracing::info!(%addr, groups = ?self.state.groups, "Mirror redirect server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        tracing::info!("Mirror redirect server shutdown complete");
        Ok(())
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.config.bind_address
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone)]
pub enum ServerError {
    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_groups() {
        let state = AppState::new(
            Arc::new(SelectionStore::new()),
            vec!["all".to_string(), "single".to_string()],
            RedirectConfig::default(),
            5,
        );
        assert!(state.has_group("all"));
        assert!(!state.has_group("multi"));
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::BindError("0.0.0.0:1340: address in use".to_string());
        assert_eq!(err.to_string(), "Failed to bind: 0.0.0.0:1340: address in use");
    }
}
