use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/models", get(handlers::list_models))
        // Chat per model
        .route(
            "/chat/:model/messages",
            get(handlers::get_history)
                .post(handlers::send_message)
                .delete(handlers::new_chat),
        )
        .route(
            "/chat/:model/messages/:id/execute-plan",
            post(handlers::execute_plan),
        )
        // Request logging; the browser client is served from another origin
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
