//! Health check handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "apf-metering",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub ready: bool,
    pub tracked_keys: usize,
    pub subscriptions: usize,
    pub checkout_sessions: usize,
}

/// Stores are in memory, so the server is ready as soon as it is up.
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: true,
        tracked_keys: state.usage.tracked_keys(),
        subscriptions: state.subscriptions.len(),
        checkout_sessions: state.checkout.session_count(),
    })
}
