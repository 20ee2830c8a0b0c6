//! API route definitions.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{checkout, health, revenue, subscriptions, usage};
use crate::middleware::{cors_layer, request_id};
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .layer(axum_middleware::from_fn(request_id))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/usage", get(usage::get_usage).post(usage::record_usage))
        .route(
            "/subscribe",
            get(subscriptions::status)
                .post(subscriptions::subscribe)
                .delete(subscriptions::cancel),
        )
        .route("/checkout", get(checkout::status).post(checkout::create))
        .route("/checkout/webhook", post(checkout::webhook))
        .route("/revenue", get(revenue::summary))
}
