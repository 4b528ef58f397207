//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{get, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/checks", get(api::list_checks))
        .route("/checks/{id}/check-in", put(api::check_in).post(api::check_in))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
