//! `smehub serve` -- HTTP JSON API for report requests.
//!
//! Exposes the report lifecycle as an async HTTP service using
//! `axum` + `tokio`. Each request runs its own lifecycle; nothing is shared
//! between requests except the read-only coordinator.
//!
//! Endpoints:
//! - GET  /                    - Liveness message
//! - GET  /health              - Liveness plus store connection flag
//! - POST /api/request-report  - Run one report lifecycle
//!
//! All responses use Content-Type: application/json. CORS is permissive.

mod handlers;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use smehub_core::LifecycleCoordinator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use self::handlers::{handle_health, handle_not_found, handle_request_report, handle_root};
use self::state::AppState;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the application router around shared state.
pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/request-report", post(handle_request_report))
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on `host:port` and run until Ctrl+C.
pub(crate) async fn start_server(
    host: &str,
    port: u16,
    coordinator: LifecycleCoordinator,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(coordinator));
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("SmeHub Report API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal...");
}
