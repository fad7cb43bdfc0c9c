//! Router configuration for the Click-to-Call API

use axum::{routing::get, Router};

use crate::handlers;
use crate::AppState;

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/call",
            get(handlers::place_call_query).post(handlers::place_call_form),
        )
        .with_state(state)
}
