use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

/// Build and configure the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // SSE events endpoint
        .route("/events", get(handlers::stream_events))
        // Key operations
        .route("/v1/keys.createKey", post(handlers::create_key))
        .route("/v1/keys.verifyKey", post(handlers::verify_key))
        .route("/v1/keys.getKey", post(handlers::get_key))
        .route("/v1/keys.deleteKey", post(handlers::delete_key))
        // Middleware
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
