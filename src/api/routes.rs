//! API Routes
//!
//! Configures the Axum router with all coordination server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_delete_handler, cache_get_handler, cache_invalidate_handler, cache_set_handler,
    debounce_count_handler, debounce_handler, health_handler, lock_handler, stats_handler,
    unlock_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/cache/:ns",
            put(cache_set_handler).delete(cache_invalidate_handler),
        )
        .route(
            "/cache/:ns/:key",
            get(cache_get_handler).delete(cache_delete_handler),
        )
        .route("/lock/:resource", post(lock_handler))
        .route("/lock/:resource/:token", delete(unlock_handler))
        .route(
            "/debounce/:key",
            post(debounce_handler).get(debounce_count_handler),
        )
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
