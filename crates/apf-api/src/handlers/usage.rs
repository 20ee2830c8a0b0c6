//! Usage metering handlers.

use apf_billing::{RecordUsage, UsageStats};
use apf_core::ApiCredential;
use apf_trace::usage_span;
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::headers::{X_API_KEY, rate_limit_headers};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UsageQuery {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBody {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl From<&UsageStats> for UsageBody {
    fn from(stats: &UsageStats) -> Self {
        Self {
            count: stats.count,
            limit: stats.limit,
            remaining: stats.remaining,
            reset_at: stats.reset_at,
        }
    }
}

#[derive(Serialize)]
pub struct UsageResponse {
    pub tier: String,
    pub date: NaiveDate,
    pub usage: UsageBody,
}

#[derive(Serialize)]
pub struct RecordedResponse {
    pub recorded: bool,
    pub usage: UsageBody,
}

fn redacted(token: Option<&str>) -> String {
    token
        .and_then(|t| ApiCredential::parse(t).ok())
        .map(|c| c.redacted())
        .unwrap_or_else(|| "invalid".to_string())
}

/// `GET /api/v1/usage?apiKey=...` (or `X-API-Key`).
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsageQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let token = query
        .api_key
        .filter(|k| !k.is_empty())
        .or_else(|| {
            headers
                .get(&X_API_KEY)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });

    let span = usage_span("get", &redacted(token.as_deref()));
    let _entered = span.enter();

    let credential = state.usage.parse_credential(token.as_deref())?;
    let stats = state
        .usage
        .get_usage(credential.key_id(), credential.tier());

    Ok((
        rate_limit_headers(&stats),
        Json(UsageResponse {
            tier: stats.tier.to_string(),
            date: stats.date,
            usage: UsageBody::from(&stats),
        }),
    )
        .into_response())
}

/// `POST /api/v1/usage` with `{apiKey, endpoint, method, status, latencyMs?}`.
pub async fn record_usage(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Response> {
    let request: RecordUsage =
        serde_json::from_slice(&body).map_err(|_| ApiError::invalid_body())?;

    let span = usage_span("record", &redacted(request.api_key.as_deref()));
    let _entered = span.enter();

    let stats = state.usage.record(request)?;

    Ok((
        rate_limit_headers(&stats),
        Json(RecordedResponse {
            recorded: true,
            usage: UsageBody::from(&stats),
        }),
    )
        .into_response())
}
