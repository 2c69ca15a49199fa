//! Redirect and metrics handlers

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::redirect::{build_redirect_uri, extract_domain_and_path};
use super::AppState;
use crate::metrics;

// ============================================================================
// API Response Types
// ============================================================================

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the redirect router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/{group}/{*path}", get(redirect_handler))
        .with_state(state)
}

/// Part of the request path after `/{group}/`, still percent-encoded
fn embedded_target(uri: &Uri) -> &str {
    uri.path().splitn(3, '/').nth(2).unwrap_or("")
}

/// Redirect to the selected mirror of a group
async fn redirect_handler(
    State(state): State<AppState>,
    Path((group, _path)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    if !state.has_group(&group) {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown group: {group}"));
    }

    let Some(host) = state.store.read(&group) else {
        metrics::record_redirect(&group, StatusCode::SERVICE_UNAVAILABLE.as_u16());
        tracing::debug!(group = %group, "no mirror selected yet");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, state.retry_after_secs.to_string())],
            Json(ErrorResponse::new(format!(
                "No mirror selected yet for group '{group}'"
            ))),
        )
            .into_response();
    };

    let target = embedded_target(&uri);
    let Some((origin, path)) = extract_domain_and_path(target) else {
        metrics::record_redirect(&group, StatusCode::BAD_REQUEST.as_u16());
        tracing::warn!(group = %group, path = target, "cannot extract origin domain and path");
        return error_response(
            StatusCode::BAD_REQUEST,
            "Expected /{group}/https://<host>/<path>",
        );
    };

    let location = build_redirect_uri(&state.redirect, &host, path);
    let Ok(value) = HeaderValue::try_from(location.as_str()) else {
        metrics::record_redirect(&group, StatusCode::BAD_REQUEST.as_u16());
        return error_response(StatusCode::BAD_REQUEST, "Redirect target is not a valid URI");
    };

    metrics::record_redirect(&group, StatusCode::MOVED_PERMANENTLY.as_u16());
    tracing::debug!(group = %group, origin, location = %location, "redirecting");
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response()
}

/// Prometheus text exposition
async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather(),
    )
}

// ============================================================================
// Tests
// ============================================================================
