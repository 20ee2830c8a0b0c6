//! Response and request header helpers.

use apf_billing::UsageStats;
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};

pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// `X-RateLimit-*` headers mirroring a usage view.
pub fn rate_limit_headers(stats: &UsageStats) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let pairs = [
        ("x-ratelimit-limit", stats.limit.to_string()),
        ("x-ratelimit-remaining", stats.remaining.to_string()),
        ("x-ratelimit-reset", stats.reset_at.to_rfc3339()),
        ("x-ratelimit-tier", stats.tier.to_string()),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    headers
}

/// `scheme://host` of the incoming request, if a `Host` header is present.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    Some(format!("{scheme}://{host}"))
}
