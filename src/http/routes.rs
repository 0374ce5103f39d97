use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Listening control
        .route("/voice/status", get(handlers::get_status))
        .route("/voice/start", post(handlers::start_listening))
        .route("/voice/stop", post(handlers::stop_listening))
        .route("/voice/toggle", post(handlers::toggle_listening))
        // Shopping list snapshot
        .route(
            "/voice/shopping-list",
            get(handlers::get_shopping_list).delete(handlers::take_shopping_list),
        )
        .route("/voice/test", post(handlers::send_test_phrase))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
