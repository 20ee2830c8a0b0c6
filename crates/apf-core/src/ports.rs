//! Port traits (hexagonal architecture).
//!
//! The subscription ledger reports revenue side effects through [`RevenueLedger`].
//! Adapters live outside this crate.

use crate::{Result, Tier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A revenue side effect of a subscription transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    SubscriptionStart { email: String, tier: Tier },
    Renewal { email: String, tier: Tier },
    /// `previous_tier` is the tier held before the cancellation.
    Cancellation { email: String, previous_tier: Tier },
}

impl LedgerEvent {
    pub fn email(&self) -> &str {
        match self {
            LedgerEvent::SubscriptionStart { email, .. }
            | LedgerEvent::Renewal { email, .. }
            | LedgerEvent::Cancellation { email, .. } => email,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::SubscriptionStart { .. } => "subscription_start",
            LedgerEvent::Renewal { .. } => "renewal",
            LedgerEvent::Cancellation { .. } => "cancellation",
        }
    }
}

/// Revenue reporting collaborator.
#[async_trait]
pub trait RevenueLedger: Send + Sync {
    async fn record_subscription_start(&self, email: &str, tier: Tier) -> Result<()>;

    async fn record_renewal(&self, email: &str, tier: Tier) -> Result<()>;

    async fn record_cancellation(&self, email: &str, previous_tier: Tier) -> Result<()>;

    /// Monthly recurring revenue in US cents.
    async fn current_mrr_cents(&self) -> Result<i64>;

    /// Churn for the current month, as a percentage rounded to two decimals.
    async fn current_churn_rate(&self) -> Result<f64>;

    /// Route an event to the matching `record_*` call.
    async fn apply(&self, event: &LedgerEvent) -> Result<()> {
        match event {
            LedgerEvent::SubscriptionStart { email, tier } => {
                self.record_subscription_start(email, *tier).await
            }
            LedgerEvent::Renewal { email, tier } => self.record_renewal(email, *tier).await,
            LedgerEvent::Cancellation {
                email,
                previous_tier,
            } => self.record_cancellation(email, *previous_tier).await,
        }
    }
}
