//! API error responses.
//!
//! Every rejection is a flat JSON object `{error, message, ...details}` where
//! `error` is a stable machine-readable code.

use crate::headers::rate_limit_headers;
use apf_billing::{BillingError, UsageStats};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Map<String, Value>,
    usage: Option<UsageStats>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Map::new(),
            usage: None,
        }
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    /// Request body was not valid JSON for this endpoint.
    pub fn invalid_body() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_body",
            "Request body is not valid JSON",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let status = match &err {
            BillingError::InvalidCredential => StatusCode::UNAUTHORIZED,
            BillingError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            BillingError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::AlreadyCancelled(_) => StatusCode::CONFLICT,
            BillingError::Payload(_) | BillingError::Internal(_) => {
                error!(error = %err, "Request failed");
                return ApiError::internal();
            }
            _ => StatusCode::BAD_REQUEST,
        };

        let mut api_error = ApiError::new(status, err.code(), err.to_string());
        match err {
            BillingError::InvalidTier { valid, .. } => {
                let valid: Vec<&str> = valid.iter().map(|t| t.as_str()).collect();
                api_error = api_error.with_detail("validTiers", json!(valid));
            }
            BillingError::PaymentRequired(_) => {
                api_error = api_error.with_detail(
                    "hint",
                    json!("Include a paymentToken field (test value: \"test_payment_token\")"),
                );
            }
            BillingError::RateLimited(stats) => api_error.usage = Some(stats),
            _ => {}
        }
        api_error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("error".to_string(), json!(self.code));
        body.insert("message".to_string(), json!(self.message));
        body.extend(self.details);

        match self.usage {
            Some(stats) => {
                body.insert(
                    "usage".to_string(),
                    json!({
                        "count": stats.count,
                        "limit": stats.limit,
                        "remaining": 0,
                        "resetAt": stats.reset_at,
                    }),
                );
                (
                    self.status,
                    rate_limit_headers(&stats),
                    Json(Value::Object(body)),
                )
                    .into_response()
            }
            None => (self.status, Json(Value::Object(body))).into_response(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use apf_core::Tier;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BillingError::InvalidCredential, StatusCode::UNAUTHORIZED),
            (BillingError::MissingFields("x"), StatusCode::BAD_REQUEST),
            (BillingError::PaymentRequired(Tier::Pro), StatusCode::PAYMENT_REQUIRED),
            (BillingError::FreeTier, StatusCode::BAD_REQUEST),
            (BillingError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (BillingError::AlreadyCancelled("x".into()), StatusCode::CONFLICT),
            (BillingError::Payload("eof".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = ApiError::from(BillingError::Payload("expected value at line 1".into()));
        assert_eq!(err.code(), "internal_error");
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn test_invalid_tier_lists_valid_tiers() {
        let err = ApiError::from(BillingError::InvalidTier {
            tier: "gold".into(),
            valid: &Tier::ALL,
        });
        assert_eq!(err.details["validTiers"], json!(["free", "pro", "enterprise"]));

        let err = ApiError::from(BillingError::InvalidTier {
            tier: "gold".into(),
            valid: &Tier::PAID,
        });
        assert_eq!(err.details["validTiers"], json!(["pro", "enterprise"]));
    }
}
