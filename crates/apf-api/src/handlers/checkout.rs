//! Checkout and webhook handlers.

use apf_billing::checkout::CURRENCY;
use apf_billing::{CheckoutSession, CreateCheckout, CreatedCheckout, WebhookAck, WebhookEvent};
use apf_trace::{checkout_span, webhook_span};
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::headers::request_origin;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateQuery {
    pub webhook: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub session_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
    pub tier: String,
    /// US dollars.
    pub amount: f64,
    pub currency: &'static str,
    pub mode: &'static str,
    pub customer_email: String,
    pub price_id: &'static str,
    pub success_url: String,
    pub cancel_url: String,
    pub expires_at: DateTime<Utc>,
    pub subscription_id: String,
}

impl From<CreatedCheckout> for CheckoutResponse {
    fn from(created: CreatedCheckout) -> Self {
        let session = created.session;
        Self {
            session_id: session.id.to_string(),
            url: created.url,
            tier: session.tier.to_string(),
            amount: session.amount_cents as f64 / 100.0,
            currency: CURRENCY,
            mode: "subscription",
            customer_email: session.customer_email,
            price_id: created.price_id,
            success_url: created.success_url,
            cancel_url: created.cancel_url,
            expires_at: created.expires_at,
            subscription_id: session.subscription_id.to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub status: apf_billing::SessionStatus,
    pub payment_status: apf_billing::PaymentStatus,
    pub tier: String,
    /// US cents.
    pub amount: i64,
    pub currency: &'static str,
    pub customer_email: String,
    pub subscription_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<CheckoutSession> for SessionView {
    fn from(session: CheckoutSession) -> Self {
        Self {
            session_id: session.id.to_string(),
            status: session.status,
            payment_status: session.payment_status,
            tier: session.tier.to_string(),
            amount: session.amount_cents,
            currency: CURRENCY,
            customer_email: session.customer_email,
            subscription_id: session.subscription_id.to_string(),
            created_at: session.created_at,
            completed_at: session.completed_at,
        }
    }
}

/// `POST /api/v1/checkout`. With `?webhook=true` the body is a webhook event.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CreateQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    if query.webhook.as_deref() == Some("true") {
        return webhook(State(state), body)
            .await
            .map(IntoResponse::into_response);
    }

    let span = checkout_span("create", None);
    let _entered = span.enter();

    let request: CreateCheckout = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!(error = %e, "Malformed checkout request");
        ApiError::internal()
    })?;
    let origin =
        request_origin(&headers).unwrap_or_else(|| state.settings.public_url.clone());

    let created = state.checkout.create_session(request, &origin)?;
    Ok(Json(CheckoutResponse::from(created)).into_response())
}

/// `GET /api/v1/checkout[?session_id=]`.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Response> {
    match query.session_id.filter(|id| !id.is_empty()) {
        Some(session_id) => {
            let span = checkout_span("status", Some(&session_id));
            let _entered = span.enter();
            let session = state.checkout.session_status(&session_id)?;
            Ok(Json(SessionView::from(session)).into_response())
        }
        None => {
            let overview = state
                .checkout
                .overview(state.settings.webhook_history_limit);
            Ok(Json(overview).into_response())
        }
    }
}

/// `POST /api/v1/checkout/webhook`. Always acknowledges a parseable event.
pub async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Json<WebhookAck>> {
    let event = WebhookEvent::from_slice(&body)?;

    let span = webhook_span(&event.event_type, event.id.as_str());
    let _entered = span.enter();

    Ok(Json(state.checkout.handle_webhook(event)))
}
