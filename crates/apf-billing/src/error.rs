//! Billing error taxonomy.

use crate::usage::UsageStats;
use apf_core::Tier;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invalid API credential")]
    InvalidCredential,

    #[error("Required fields: {0}")]
    MissingFields(&'static str),

    #[error("A valid email address is required")]
    InvalidEmail,

    #[error("Invalid tier: {tier}. Valid: {}", Tier::join(valid))]
    InvalidTier {
        tier: String,
        valid: &'static [Tier],
    },

    #[error("Email parameter is required (?email=user@example.com)")]
    MissingEmail,

    #[error("Subscribing to the {0} tier requires payment information")]
    PaymentRequired(Tier),

    #[error("Free tier does not require checkout")]
    FreeTier,

    #[error("Daily request limit ({}) exceeded; resets at {}", .0.limit, .0.reset_at.to_rfc3339())]
    RateLimited(UsageStats),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Subscription for {0} is already cancelled")]
    AlreadyCancelled(String),

    #[error("Malformed payload: {0}")]
    Payload(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::InvalidCredential => "invalid_api_key",
            BillingError::MissingFields(_) => "missing_fields",
            BillingError::InvalidEmail => "invalid_email",
            BillingError::InvalidTier { .. } => "invalid_tier",
            BillingError::MissingEmail => "missing_email",
            BillingError::PaymentRequired(_) => "payment_required",
            BillingError::FreeTier => "free_tier",
            BillingError::RateLimited(_) => "rate_limit_exceeded",
            BillingError::NotFound(_) => "not_found",
            BillingError::AlreadyCancelled(_) => "already_cancelled",
            BillingError::Payload(_) | BillingError::Internal(_) => "internal_error",
        }
    }

    /// Usage stats to hand back with a rate-limit rejection.
    pub fn usage(&self) -> Option<&UsageStats> {
        match self {
            BillingError::RateLimited(stats) => Some(stats),
            _ => None,
        }
    }
}

impl From<apf_core::Error> for BillingError {
    fn from(err: apf_core::Error) -> Self {
        match err {
            apf_core::Error::InvalidCredential => BillingError::InvalidCredential,
            apf_core::Error::InvalidTier(tier) => BillingError::InvalidTier {
                tier,
                valid: &Tier::ALL,
            },
            apf_core::Error::InvalidEmail(_) => BillingError::InvalidEmail,
            apf_core::Error::Serialization(msg) => BillingError::Payload(msg),
            apf_core::Error::Ledger(msg) | apf_core::Error::Internal(msg) => {
                BillingError::Internal(msg)
            }
        }
    }
}

impl From<serde_json::Error> for BillingError {
    fn from(err: serde_json::Error) -> Self {
        BillingError::Payload(err.to_string())
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;
