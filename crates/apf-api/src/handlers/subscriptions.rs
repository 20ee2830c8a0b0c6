//! Subscription handlers.

use apf_billing::{
    Cancellation, SubscribeOutcome, SubscribeRequest, SubscriptionAggregate, SubscriptionStatus,
};
use apf_trace::subscription_span;
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct SubscribeResponse<'a> {
    pub status: &'static str,
    pub subscription: &'a apf_billing::SubscriptionRecord,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub found: bool,
    pub subscription: SubscriptionStatus,
}

#[derive(Serialize)]
pub struct AggregateResponse {
    pub aggregate: SubscriptionAggregate,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
    pub subscription: Cancellation,
}

/// `POST /api/v1/subscribe`: 201 when created, 200 when renewed.
pub async fn subscribe(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Response> {
    let request: SubscribeRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::invalid_body())?;

    let span = subscription_span("subscribe", request.email.as_deref());
    let _entered = span.enter();

    let outcome = state.subscriptions.subscribe(request)?;
    let status = match outcome {
        SubscribeOutcome::Created(_) => StatusCode::CREATED,
        SubscribeOutcome::Renewed(_) => StatusCode::OK,
    };

    Ok((
        status,
        Json(SubscribeResponse {
            status: outcome.status(),
            subscription: outcome.record(),
        }),
    )
        .into_response())
}

/// `GET /api/v1/subscribe[?email=]`: one record, or aggregate figures without an email.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Response> {
    match query.email.filter(|e| !e.is_empty()) {
        Some(email) => {
            let span = subscription_span("status", Some(&email));
            let _entered = span.enter();
            let subscription = state.subscriptions.status(&email)?;
            Ok(Json(StatusResponse {
                found: true,
                subscription,
            })
            .into_response())
        }
        None => {
            let aggregate = state
                .subscriptions
                .aggregate()
                .instrument(subscription_span("aggregate", None))
                .await?;
            Ok(Json(AggregateResponse { aggregate }).into_response())
        }
    }
}

/// `DELETE /api/v1/subscribe?email=`.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Json<CancelResponse>> {
    let span = subscription_span("cancel", query.email.as_deref());
    let _entered = span.enter();

    let subscription = state.subscriptions.cancel(query.email.as_deref())?;
    Ok(Json(CancelResponse {
        status: "cancelled",
        subscription,
    }))
}
