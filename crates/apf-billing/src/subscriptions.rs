//! Subscriber entitlement ledger.
//!
//! One record per email. Subscribing while active renews in place; cancelling
//! forces the tier back to free; passing `expires_at` only flips `active` and is
//! noticed the next time the record is read or written.

use crate::error::{BillingError, BillingResult};
use crate::notifier::LedgerNotifier;
use apf_core::email::is_valid_email;
use apf_core::ports::{LedgerEvent, RevenueLedger};
use apf_core::{Clock, Tier};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub email: String,
    pub tier: Tier,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub renewal_count: u32,
}

impl SubscriptionRecord {
    pub fn new(email: impl Into<String>, tier: Tier, now: DateTime<Utc>) -> Self {
        Self {
            email: email.into(),
            tier,
            active: true,
            created_at: now,
            expires_at: now + Duration::days(SUBSCRIPTION_PERIOD_DAYS),
            renewal_count: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Apply passive expiry. Tier is left as is. Returns true if `active` flipped.
    pub fn reconcile(&mut self, now: DateTime<Utc>) -> bool {
        if self.active && self.is_expired(now) {
            self.active = false;
            return true;
        }
        false
    }

    fn renew(&mut self, tier: Tier, now: DateTime<Utc>) {
        self.tier = tier;
        self.expires_at = now + Duration::days(SUBSCRIPTION_PERIOD_DAYS);
        self.renewal_count += 1;
    }
}

/// Body of a subscribe call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub email: Option<String>,
    /// Kept as raw JSON so a non-string tier is reported as `invalid_tier`.
    pub tier: Option<Value>,
    pub payment_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created(SubscriptionRecord),
    Renewed(SubscriptionRecord),
}

impl SubscribeOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            SubscribeOutcome::Created(_) => "created",
            SubscribeOutcome::Renewed(_) => "renewed",
        }
    }

    pub fn record(&self) -> &SubscriptionRecord {
        match self {
            SubscribeOutcome::Created(record) | SubscribeOutcome::Renewed(record) => record,
        }
    }
}

/// A single record as of a read, plus whether its period has lapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    #[serde(flatten)]
    pub record: SubscriptionRecord,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionAggregate {
    pub total_subscriptions: usize,
    pub active_subscriptions: usize,
    /// US dollars.
    pub mrr: f64,
    pub churn_rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub email: String,
    pub previous_tier: Tier,
    pub active: bool,
    pub cancelled_at: DateTime<Utc>,
}

pub struct SubscriptionLedger {
    clock: Arc<dyn Clock>,
    records: DashMap<String, SubscriptionRecord>,
    revenue: Arc<dyn RevenueLedger>,
    notifier: LedgerNotifier,
}

impl SubscriptionLedger {
    pub fn new(
        clock: Arc<dyn Clock>,
        revenue: Arc<dyn RevenueLedger>,
        notifier: LedgerNotifier,
    ) -> Self {
        Self {
            clock,
            records: DashMap::new(),
            revenue,
            notifier,
        }
    }

    pub fn notifier(&self) -> &LedgerNotifier {
        &self.notifier
    }

    /// Create or renew the subscription for an email.
    pub fn subscribe(&self, request: SubscribeRequest) -> BillingResult<SubscribeOutcome> {
        let email = request
            .email
            .filter(|e| is_valid_email(e))
            .ok_or(BillingError::InvalidEmail)?;
        let tier = Tier::from_json(request.tier.as_ref())?;
        let has_token = request
            .payment_token
            .as_deref()
            .is_some_and(|t| !t.is_empty());
        if tier.is_paid() && !has_token {
            return Err(BillingError::PaymentRequired(tier));
        }

        let now = self.clock.now();
        let outcome = match self.records.entry(email.clone()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.reconcile(now);
                if record.active {
                    record.renew(tier, now);
                    SubscribeOutcome::Renewed(record.clone())
                } else {
                    *record = SubscriptionRecord::new(email.clone(), tier, now);
                    SubscribeOutcome::Created(record.clone())
                }
            }
            Entry::Vacant(entry) => {
                let record = SubscriptionRecord::new(email.clone(), tier, now);
                entry.insert(record.clone());
                SubscribeOutcome::Created(record)
            }
        };

        let event = match &outcome {
            SubscribeOutcome::Created(_) => {
                info!(%email, %tier, "Subscription created");
                LedgerEvent::SubscriptionStart { email, tier }
            }
            SubscribeOutcome::Renewed(record) => {
                info!(%email, %tier, renewals = record.renewal_count, "Subscription renewed");
                LedgerEvent::Renewal { email, tier }
            }
        };
        self.notifier.notify(event);

        Ok(outcome)
    }

    /// Look up one subscriber, applying passive expiry first.
    pub fn status(&self, email: &str) -> BillingResult<SubscriptionStatus> {
        let now = self.clock.now();
        let mut record = self
            .records
            .get_mut(email)
            .ok_or_else(|| BillingError::NotFound(format!("Subscription for {email}")))?;
        if record.reconcile(now) {
            debug!(%email, "Subscription expired");
        }
        Ok(SubscriptionStatus {
            expired: record.is_expired(now),
            record: record.clone(),
        })
    }

    /// Counts across all records plus revenue metrics from the ledger.
    pub async fn aggregate(&self) -> BillingResult<SubscriptionAggregate> {
        let now = self.clock.now();
        let mut active_subscriptions = 0;
        for mut record in self.records.iter_mut() {
            record.reconcile(now);
            if record.active {
                active_subscriptions += 1;
            }
        }

        let mrr_cents = self.revenue.current_mrr_cents().await?;
        let churn_rate_pct = self.revenue.current_churn_rate().await?;

        Ok(SubscriptionAggregate {
            total_subscriptions: self.records.len(),
            active_subscriptions,
            mrr: mrr_cents as f64 / 100.0,
            churn_rate_pct,
        })
    }

    /// Cancel an active subscription. The tier drops back to free.
    pub fn cancel(&self, email: Option<&str>) -> BillingResult<Cancellation> {
        let email = email
            .filter(|e| !e.is_empty())
            .ok_or(BillingError::MissingEmail)?;
        let now = self.clock.now();

        let previous_tier = {
            let mut record = self
                .records
                .get_mut(email)
                .ok_or_else(|| BillingError::NotFound(format!("Subscription for {email}")))?;
            record.reconcile(now);
            if !record.active {
                return Err(BillingError::AlreadyCancelled(email.to_string()));
            }
            let previous = record.tier;
            record.active = false;
            record.tier = Tier::Free;
            previous
        };

        info!(%email, %previous_tier, "Subscription cancelled");
        self.notifier.notify(LedgerEvent::Cancellation {
            email: email.to_string(),
            previous_tier,
        });

        Ok(Cancellation {
            email: email.to_string(),
            previous_tier,
            active: false,
            cancelled_at: now,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revenue::InMemoryRevenueLedger;
    use apf_core::ManualClock;
    use chrono::TimeZone;

    struct Fixture {
        clock: Arc<ManualClock>,
        revenue: Arc<InMemoryRevenueLedger>,
        ledger: SubscriptionLedger,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 24, 8, 0, 0).unwrap(),
        ));
        let revenue = Arc::new(InMemoryRevenueLedger::new(clock.clone()));
        let notifier = LedgerNotifier::spawn(revenue.clone(), 64);
        let ledger = SubscriptionLedger::new(clock.clone(), revenue.clone(), notifier);
        Fixture {
            clock,
            revenue,
            ledger,
        }
    }

    fn request(email: &str, tier: &str, token: Option<&str>) -> SubscribeRequest {
        SubscribeRequest {
            email: Some(email.to_string()),
            tier: Some(Value::from(tier)),
            payment_token: token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_subscribe_then_renew_with_new_tier() {
        let f = fixture();
        let first = f.ledger.subscribe(request("a@b.com", "pro", Some("tok"))).unwrap();
        assert_eq!(first.status(), "created");
        assert_eq!(first.record().tier, Tier::Pro);
        assert_eq!(first.record().renewal_count, 0);

        f.clock.advance(Duration::hours(1));
        let second = f
            .ledger
            .subscribe(request("a@b.com", "enterprise", Some("tok")))
            .unwrap();
        assert_eq!(second.status(), "renewed");
        assert_eq!(second.record().tier, Tier::Enterprise);
        assert_eq!(second.record().renewal_count, 1);
        assert!(second.record().expires_at > first.record().expires_at);
        assert_eq!(second.record().created_at, first.record().created_at);
        assert_eq!(f.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_twice_conflicts() {
        let f = fixture();
        f.ledger.subscribe(request("a@b.com", "pro", Some("tok"))).unwrap();

        let cancelled = f.ledger.cancel(Some("a@b.com")).unwrap();
        assert_eq!(cancelled.previous_tier, Tier::Pro);
        assert!(!cancelled.active);

        let err = f.ledger.cancel(Some("a@b.com")).unwrap_err();
        assert_eq!(err.code(), "already_cancelled");

        let status = f.ledger.status("a@b.com").unwrap();
        assert_eq!(status.record.tier, Tier::Free);
        assert!(!status.record.active);
    }

    #[tokio::test]
    async fn test_validation_errors_create_nothing() {
        let f = fixture();
        let err = f.ledger.subscribe(request("bad-email", "pro", Some("tok"))).unwrap_err();
        assert_eq!(err.code(), "invalid_email");

        let err = f.ledger.subscribe(request("a@b.com", "gold", Some("tok"))).unwrap_err();
        assert_eq!(err.code(), "invalid_tier");

        let mut numeric = request("a@b.com", "pro", Some("tok"));
        numeric.tier = Some(Value::from(5));
        let err = f.ledger.subscribe(numeric).unwrap_err();
        assert_eq!(err.to_string(), "Invalid tier: 5. Valid: free, pro, enterprise");

        let err = f.ledger.subscribe(request("a@b.com", "pro", None)).unwrap_err();
        assert_eq!(err.code(), "payment_required");

        let err = f.ledger.subscribe(request("a@b.com", "pro", Some(""))).unwrap_err();
        assert_eq!(err.code(), "payment_required");

        assert!(f.ledger.is_empty());
        assert_eq!(f.ledger.status("a@b.com").unwrap_err().code(), "not_found");
    }

    #[tokio::test]
    async fn test_free_tier_needs_no_token() {
        let f = fixture();
        let outcome = f.ledger.subscribe(request("a@b.com", "free", None)).unwrap();
        assert_eq!(outcome.status(), "created");
        assert!(outcome.record().active);
    }

    #[tokio::test]
    async fn test_passive_expiry_keeps_tier() {
        let f = fixture();
        f.ledger.subscribe(request("a@b.com", "pro", Some("tok"))).unwrap();

        f.clock.advance(Duration::days(30) + Duration::seconds(1));
        let status = f.ledger.status("a@b.com").unwrap();
        assert!(status.expired);
        assert!(!status.record.active);
        assert_eq!(status.record.tier, Tier::Pro);
    }

    #[tokio::test]
    async fn test_subscribe_after_expiry_starts_fresh() {
        let f = fixture();
        f.ledger.subscribe(request("a@b.com", "pro", Some("tok"))).unwrap();
        f.ledger.subscribe(request("a@b.com", "pro", Some("tok"))).unwrap();

        f.clock.advance(Duration::days(31));
        let outcome = f.ledger.subscribe(request("a@b.com", "pro", Some("tok"))).unwrap();
        assert_eq!(outcome.status(), "created");
        assert_eq!(outcome.record().renewal_count, 0);
        assert_eq!(outcome.record().created_at, f.clock.now());
    }

    #[tokio::test]
    async fn test_cancel_missing_and_unknown() {
        let f = fixture();
        assert_eq!(f.ledger.cancel(None).unwrap_err().code(), "missing_email");
        assert_eq!(f.ledger.cancel(Some("")).unwrap_err().code(), "missing_email");
        assert_eq!(
            f.ledger.cancel(Some("x@y.com")).unwrap_err().code(),
            "not_found"
        );
    }

    #[tokio::test]
    async fn test_aggregate_reflects_ledger() {
        let f = fixture();
        f.ledger.subscribe(request("a@b.com", "pro", Some("tok"))).unwrap();
        f.ledger.subscribe(request("c@d.com", "enterprise", Some("tok"))).unwrap();
        f.ledger.subscribe(request("e@f.com", "free", None)).unwrap();
        f.ledger.cancel(Some("c@d.com")).unwrap();
        f.ledger.notifier().flush().await;

        let aggregate = f.ledger.aggregate().await.unwrap();
        assert_eq!(aggregate.total_subscriptions, 3);
        assert_eq!(aggregate.active_subscriptions, 2);
        assert_eq!(aggregate.mrr, 4.99);
        assert_eq!(f.revenue.events().len(), 4);
    }
}
