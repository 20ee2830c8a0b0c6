//! Revenue and usage reporting for operators.

use apf_billing::{LogEntry, RevenueSummary};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

pub const DEFAULT_REPORT_LIMIT: usize = 20;

#[derive(Deserialize)]
pub struct ReportQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueResponse {
    /// US dollars.
    pub mrr: f64,
    #[serde(flatten)]
    pub summary: RevenueSummary,
    pub recent_usage: Vec<LogEntry>,
}

/// `GET /api/v1/revenue[?limit=]`. Waits for queued ledger updates first.
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Json<RevenueResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_REPORT_LIMIT);
    state.subscriptions.notifier().flush().await;

    let summary = state.revenue.summary(limit);
    Json(RevenueResponse {
        mrr: summary.mrr_cents as f64 / 100.0,
        summary,
        recent_usage: state.usage.recent_logs(limit),
    })
}
