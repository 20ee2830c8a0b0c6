//! Checkout sessions and webhook-driven completion.
//!
//! A session starts `open` and ends either `complete` (a completion webhook
//! names it) or `expired` (read more than 30 minutes after creation while
//! still open). Both end states are terminal.

use crate::error::{BillingError, BillingResult};
use crate::ring::BoundedLog;
use crate::webhooks::{WebhookAck, WebhookAction, WebhookEvent, WebhookEventType, WebhookLogEntry};
use apf_core::{CheckoutSessionId, Clock, SubscriptionRef, Tier};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SESSION_TTL_MINUTES: i64 = 30;
pub const WEBHOOK_LOG_CAPACITY: usize = 100;
pub const DEFAULT_CHECKOUT_BASE_URL: &str = "https://checkout.stripe.com/c/pay";
pub const CURRENCY: &str = "usd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Complete,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    NoPaymentRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub id: CheckoutSessionId,
    pub customer_email: String,
    pub tier: Tier,
    pub amount_cents: i64,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub subscription_id: SubscriptionRef,
}

impl CheckoutSession {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::minutes(SESSION_TTL_MINUTES)
    }

    /// Open and past its TTL. Terminal sessions never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Open
            && now - self.created_at > Duration::minutes(SESSION_TTL_MINUTES)
    }

    pub fn reconcile(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) {
            self.status = SessionStatus::Expired;
            return true;
        }
        false
    }

    /// Mark paid. Only an open session can complete.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != SessionStatus::Open {
            return false;
        }
        self.status = SessionStatus::Complete;
        self.payment_status = PaymentStatus::Paid;
        self.completed_at = Some(now);
        true
    }
}

/// Body of a checkout creation call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckout {
    pub tier: Option<Value>,
    pub email: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCheckout {
    pub session: CheckoutSession,
    pub url: String,
    pub price_id: &'static str,
    pub success_url: String,
    pub cancel_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOverview {
    pub recent_webhooks: Vec<WebhookLogEntry>,
    pub active_sessions: usize,
}

pub struct CheckoutProcessor {
    clock: Arc<dyn Clock>,
    checkout_base_url: String,
    sessions: DashMap<CheckoutSessionId, CheckoutSession>,
    webhooks: BoundedLog<WebhookLogEntry>,
}

impl CheckoutProcessor {
    pub fn new(clock: Arc<dyn Clock>, checkout_base_url: impl Into<String>) -> Self {
        Self {
            clock,
            checkout_base_url: checkout_base_url.into().trim_end_matches('/').to_string(),
            sessions: DashMap::new(),
            webhooks: BoundedLog::new(WEBHOOK_LOG_CAPACITY),
        }
    }

    /// Open a session for a paid tier. `origin` seeds the default redirect URLs.
    pub fn create_session(
        &self,
        request: CreateCheckout,
        origin: &str,
    ) -> BillingResult<CreatedCheckout> {
        let tier = Tier::from_json(request.tier.as_ref()).map_err(|err| match err {
            apf_core::Error::InvalidTier(tier) => BillingError::InvalidTier {
                tier,
                valid: &Tier::PAID,
            },
            other => other.into(),
        })?;
        let email = request
            .email
            .filter(|e| e.contains('@'))
            .ok_or(BillingError::InvalidEmail)?;
        let price_id = match tier.price_id() {
            Some(id) if tier.is_paid() => id,
            _ => return Err(BillingError::FreeTier),
        };

        let now = self.clock.now();
        let session = CheckoutSession {
            id: CheckoutSessionId::new(),
            customer_email: email,
            tier,
            amount_cents: tier.monthly_price_cents(),
            status: SessionStatus::Open,
            payment_status: PaymentStatus::Unpaid,
            created_at: now,
            completed_at: None,
            subscription_id: SubscriptionRef::new(),
        };

        let origin = origin.trim_end_matches('/');
        let success_url = request
            .success_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("{origin}/payment/success?session_id={}", session.id));
        let cancel_url = request
            .cancel_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("{origin}/payment/cancel"));

        self.sessions.insert(session.id.clone(), session.clone());
        info!(session_id = %session.id, %tier, "Checkout session created");

        Ok(CreatedCheckout {
            url: format!("{}/{}", self.checkout_base_url, session.id),
            expires_at: session.expires_at(),
            session,
            price_id,
            success_url,
            cancel_url,
        })
    }

    /// One session, with lazy expiry applied.
    pub fn session_status(&self, session_id: &str) -> BillingResult<CheckoutSession> {
        let now = self.clock.now();
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| BillingError::NotFound(format!("Session {session_id}")))?;
        if session.reconcile(now) {
            debug!(session_id, "Checkout session expired");
        }
        Ok(session.clone())
    }

    /// Newest webhook deliveries and the number of tracked sessions.
    pub fn overview(&self, webhook_limit: usize) -> CheckoutOverview {
        CheckoutOverview {
            recent_webhooks: self.webhooks.recent(webhook_limit),
            active_sessions: self.sessions.len(),
        }
    }

    /// Log and dispatch a webhook delivery. Never fails once parsed.
    pub fn handle_webhook(&self, event: WebhookEvent) -> WebhookAck {
        let now = self.clock.now();
        self.webhooks.push(WebhookLogEntry {
            timestamp: now,
            event_type: event.event_type.clone(),
            event_id: event.id.clone(),
            processed: true,
        });

        match event.kind {
            WebhookEventType::CheckoutSessionCompleted => {
                if let Some(session_id) = event.object_id() {
                    match self.sessions.get_mut(session_id) {
                        Some(mut session) => {
                            if session.complete(now) {
                                info!(session_id, "Checkout session completed");
                            } else {
                                debug!(session_id, status = ?session.status, "Completion for closed session");
                            }
                        }
                        None => debug!(session_id, "Completion for unknown session"),
                    }
                }
            }
            WebhookEventType::Unknown => {
                warn!(event_type = %event.event_type, event_id = %event.id, "Ignoring unhandled webhook type");
            }
            _ => {
                info!(event_type = %event.event_type, event_id = %event.id, "Webhook acknowledged");
            }
        }

        WebhookAck {
            received: true,
            action: WebhookAction::acknowledge(&event),
            event_type: event.event_type,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn webhook_count(&self) -> usize {
        self.webhooks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apf_core::ManualClock;
    use chrono::TimeZone;
    use serde_json::json;

    const ORIGIN: &str = "http://localhost:8080";

    fn processor() -> (Arc<ManualClock>, CheckoutProcessor) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 25, 10, 0, 0).unwrap(),
        ));
        let processor = CheckoutProcessor::new(clock.clone(), DEFAULT_CHECKOUT_BASE_URL);
        (clock, processor)
    }

    fn create(tier: &str, email: &str) -> CreateCheckout {
        CreateCheckout {
            tier: Some(Value::from(tier)),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    fn completion(session_id: &str) -> WebhookEvent {
        WebhookEvent::from_value(json!({
            "id": "evt_test",
            "type": "checkout.session.completed",
            "data": {"object": {"id": session_id}}
        }))
        .unwrap()
    }

    #[test]
    fn test_create_session() {
        let (clock, processor) = processor();
        let created = processor.create_session(create("pro", "a@b.com"), ORIGIN).unwrap();

        let id = created.session.id.to_string();
        assert!(id.starts_with("cs_"));
        assert_eq!(created.session.status, SessionStatus::Open);
        assert_eq!(created.session.payment_status, PaymentStatus::Unpaid);
        assert_eq!(created.session.amount_cents, 499);
        assert_eq!(created.price_id, "price_applefarm_pro_499");
        assert_eq!(created.url, format!("https://checkout.stripe.com/c/pay/{id}"));
        assert_eq!(
            created.success_url,
            format!("{ORIGIN}/payment/success?session_id={id}")
        );
        assert_eq!(created.cancel_url, format!("{ORIGIN}/payment/cancel"));
        assert_eq!(created.expires_at, clock.now() + Duration::minutes(30));
        assert!(created.session.subscription_id.as_str().starts_with("sub_"));
    }

    #[test]
    fn test_caller_urls_win() {
        let (_, processor) = processor();
        let mut request = create("enterprise", "a@b.com");
        request.success_url = Some("https://shop.example/ok".into());
        request.cancel_url = Some("https://shop.example/no".into());
        let created = processor.create_session(request, ORIGIN).unwrap();
        assert_eq!(created.success_url, "https://shop.example/ok");
        assert_eq!(created.cancel_url, "https://shop.example/no");
        assert_eq!(created.session.amount_cents, 1_999);
    }

    #[test]
    fn test_create_rejections() {
        let (_, processor) = processor();
        let code = |req| processor.create_session(req, ORIGIN).unwrap_err().code();

        assert_eq!(code(create("free", "a@b.com")), "free_tier");
        assert_eq!(code(create("gold", "a@b.com")), "invalid_tier");
        assert_eq!(code(CreateCheckout::default()), "invalid_tier");
        assert_eq!(code(create("pro", "nobody")), "invalid_email");
        assert_eq!(processor.session_count(), 0);
    }

    #[test]
    fn test_non_string_tier_lists_paid_tiers() {
        let (_, processor) = processor();
        let request = CreateCheckout {
            tier: Some(json!(5)),
            email: Some("a@b.com".into()),
            ..Default::default()
        };
        match processor.create_session(request, ORIGIN) {
            Err(BillingError::InvalidTier { tier, valid }) => {
                assert_eq!(tier, "5");
                assert_eq!(valid, &Tier::PAID);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_open_session_expires_after_ttl() {
        let (clock, processor) = processor();
        let created = processor.create_session(create("pro", "a@b.com"), ORIGIN).unwrap();
        let id = created.session.id.to_string();

        clock.advance(Duration::minutes(30));
        assert_eq!(processor.session_status(&id).unwrap().status, SessionStatus::Open);

        clock.advance(Duration::minutes(1));
        assert_eq!(processor.session_status(&id).unwrap().status, SessionStatus::Expired);

        processor.handle_webhook(completion(&id));
        assert_eq!(processor.session_status(&id).unwrap().status, SessionStatus::Expired);
    }

    #[test]
    fn test_completion_before_read_wins_over_expiry() {
        let (clock, processor) = processor();
        let created = processor.create_session(create("pro", "a@b.com"), ORIGIN).unwrap();
        let id = created.session.id.to_string();

        clock.advance(Duration::minutes(5));
        let ack = processor.handle_webhook(completion(&id));
        assert!(ack.received);
        assert_eq!(
            ack.action,
            WebhookAction::SessionCompleted {
                session_id: Some(id.clone())
            }
        );

        clock.advance(Duration::hours(2));
        let session = processor.session_status(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Complete);
        assert_eq!(session.payment_status, PaymentStatus::Paid);
        assert_eq!(session.completed_at, Some(session.created_at + Duration::minutes(5)));
    }

    #[test]
    fn test_completion_for_unknown_session_is_acknowledged() {
        let (_, processor) = processor();
        let ack = processor.handle_webhook(completion("cs_does_not_exist"));
        assert!(ack.received);
        assert_eq!(processor.session_count(), 0);
        assert_eq!(processor.webhook_count(), 1);
        assert_eq!(
            processor.session_status("cs_does_not_exist").unwrap_err().code(),
            "not_found"
        );
    }

    #[test]
    fn test_webhook_log_is_bounded_and_overview_limited() {
        let (_, processor) = processor();
        for i in 0..150 {
            let event = WebhookEvent::from_value(json!({
                "id": format!("evt_{i}"),
                "type": "invoice.payment_succeeded"
            }))
            .unwrap();
            processor.handle_webhook(event);
        }
        assert_eq!(processor.webhook_count(), WEBHOOK_LOG_CAPACITY);

        let overview = processor.overview(20);
        assert_eq!(overview.recent_webhooks.len(), 20);
        assert_eq!(overview.recent_webhooks[19].event_id.as_str(), "evt_149");
        assert_eq!(overview.recent_webhooks[0].event_id.as_str(), "evt_130");
        assert_eq!(overview.active_sessions, 0);
    }
}
