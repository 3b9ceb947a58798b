//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/status", get(handlers::daemon_status))
        .route("/events", post(handlers::ingest_event))
        .route("/batch", post(handlers::trigger_batch));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
