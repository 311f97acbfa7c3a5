//! Builds the `axum::Router` (spec.md §4.1 "Dispatcher"): CORS preflight
//! handling and per-request trace spans via `tower-http`, the fixed auth
//! surface, and a longest-prefix fallback onto the collection registry for
//! everything else.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::collection_routes;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/validate", get(auth::validate))
        .fallback(collection_routes::dispatch)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
