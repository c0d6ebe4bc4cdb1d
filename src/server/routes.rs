//! Router configuration for the web server.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Room for form fields and multipart framing on top of the file itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state
        .processor
        .request_policy()
        .max_file_size_bytes()
        .saturating_add(UPLOAD_OVERHEAD_BYTES);

    Router::new()
        // Analysis
        .route("/api/analyze", post(handlers::analyze_url))
        .route(
            "/api/analyze/upload",
            post(handlers::analyze_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Review queue
        .route("/api/review/pending", get(handlers::list_pending))
        .route("/api/review/:analysis_id", get(handlers::review_detail))
        .route("/api/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
