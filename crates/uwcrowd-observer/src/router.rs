//! Axum router construction for the observer API.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the observer router.
///
/// CORS allows any origin with `GET` only, so the dashboard can poll the
/// API from its own host.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/snapshot", get(handlers::get_snapshot))
        .route("/api/baselines", get(handlers::get_baselines))
        .route("/api/locations/{id}", get(handlers::get_location))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
