//! HTTP route handlers: liveness and report requests.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use smehub_core::ReportRequest;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /
pub(crate) async fn handle_root() -> impl IntoResponse {
    let response = serde_json::json!({
        "message": "SmeHub Report API is running",
        "status": "healthy",
    });
    (StatusCode::OK, Json(response))
}

/// GET /health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let response = serde_json::json!({
        "status": "healthy",
        "timestamp": timestamp,
        "firebase_connected": state.store_connected,
    });
    (StatusCode::OK, Json(response))
}

/// POST /api/request-report
///
/// Malformed bodies are rejected before the lifecycle runs, keeping axum's
/// rejection status. Validation failures map to 400 and generation failures
/// to 500; store failures never reach the caller.
pub(crate) async fn handle_request_report(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(status = %rejection.status(), "rejecting malformed report request");
            return json_error(rejection.status(), &rejection.body_text()).into_response();
        }
    };

    match state.coordinator.process_request(&request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) if e.is_client_error() => {
            json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Internal server error: {}", e),
        )
        .into_response(),
    }
}
