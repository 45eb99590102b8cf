//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, get_handler, health_handler, rate_limit_check_handler,
    rate_limit_reset_handler, set_handler, stats_handler, AppState,
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
        .route("/cache", put(set_handler))
        .route("/cache/:key", get(get_handler).delete(delete_handler))
        .route("/rate-limit/check", post(rate_limit_check_handler))
        .route("/rate-limit/:policy/:key", delete(rate_limit_reset_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
