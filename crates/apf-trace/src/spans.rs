//! Spans for metering operations.
//!
//! Credentials are recorded only in redacted form.

use tracing::{Level, Span, span};

/// Span for a usage read or write. `api_key` must already be redacted.
pub fn usage_span(operation: &str, api_key: &str) -> Span {
    span!(
        Level::INFO,
        "usage.operation",
        apf.component = "usage_meter",
        operation = operation,
        apf.api_key = api_key,
    )
}

pub fn subscription_span(operation: &str, email: Option<&str>) -> Span {
    span!(
        Level::INFO,
        "subscription.operation",
        apf.component = "subscription_ledger",
        operation = operation,
        apf.email = email.unwrap_or(""),
    )
}

pub fn checkout_span(operation: &str, session_id: Option<&str>) -> Span {
    span!(
        Level::INFO,
        "checkout.operation",
        apf.component = "checkout_processor",
        operation = operation,
        apf.session_id = session_id.unwrap_or(""),
    )
}

/// Span for one inbound webhook delivery.
pub fn webhook_span(event_type: &str, event_id: &str) -> Span {
    span!(
        Level::INFO,
        "webhook.receive",
        apf.component = "checkout_processor",
        webhook.event_type = event_type,
        webhook.event_id = event_id,
    )
}
