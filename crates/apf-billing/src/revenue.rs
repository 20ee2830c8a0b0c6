//! In-memory revenue ledger.

use apf_core::ports::RevenueLedger;
use apf_core::{Clock, Result, Tier};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueEventType {
    SubscriptionStart,
    Renewal,
    Cancellation,
}

/// One entry of the revenue event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: RevenueEventType,
    pub email: String,
    /// Tier after the event.
    pub tier: Tier,
    pub previous_tier: Option<Tier>,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Copy)]
struct SubscriberState {
    tier: Tier,
    active: bool,
}

impl SubscriberState {
    fn is_paying(&self) -> bool {
        self.active && self.tier.is_paid()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRevenue {
    pub tier: Tier,
    pub name: &'static str,
    pub price_cents: i64,
    pub subscribers: u32,
    pub revenue_cents: i64,
}

/// Churn for a calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnReport {
    pub year: i32,
    pub month: u32,
    pub cancellations: u32,
    pub new_subscriptions: u32,
    /// Estimated as current paying + cancellations - new subscriptions.
    pub start_active: u32,
    pub churn_rate_pct: f64,
}

/// Operator view of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub mrr_cents: i64,
    pub churn: ChurnReport,
    pub by_tier: Vec<TierRevenue>,
    pub event_count: usize,
    /// Newest events, oldest first.
    pub recent_events: Vec<RevenueEvent>,
}

pub struct InMemoryRevenueLedger {
    clock: Arc<dyn Clock>,
    events: Mutex<Vec<RevenueEvent>>,
    subscribers: DashMap<String, SubscriberState>,
}

impl InMemoryRevenueLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            events: Mutex::new(Vec::new()),
            subscribers: DashMap::new(),
        }
    }

    fn events_lock(&self) -> MutexGuard<'_, Vec<RevenueEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, event_type: RevenueEventType, email: &str, tier: Tier, previous: Option<Tier>) {
        let amount_cents = match event_type {
            RevenueEventType::Cancellation => 0,
            _ => tier.monthly_price_cents(),
        };
        let event = RevenueEvent {
            timestamp: self.clock.now(),
            event_type,
            email: email.to_string(),
            tier,
            previous_tier: previous,
            amount_cents,
        };

        match event_type {
            RevenueEventType::SubscriptionStart | RevenueEventType::Renewal => {
                self.subscribers
                    .insert(email.to_string(), SubscriberState { tier, active: true });
            }
            RevenueEventType::Cancellation => {
                if let Some(mut state) = self.subscribers.get_mut(email) {
                    state.active = false;
                    state.tier = Tier::Free;
                }
            }
        }

        debug!(event_type = ?event.event_type, %tier, amount_cents, "Revenue event tracked");
        self.events_lock().push(event);
    }

    /// Full event log, oldest first.
    pub fn events(&self) -> Vec<RevenueEvent> {
        self.events_lock().clone()
    }

    /// Sum of current paying subscriptions, in cents.
    pub fn mrr_cents(&self) -> i64 {
        self.subscribers
            .iter()
            .filter(|s| s.is_paying())
            .map(|s| s.tier.monthly_price_cents())
            .sum()
    }

    pub fn revenue_by_tier(&self) -> Vec<TierRevenue> {
        Tier::ALL
            .iter()
            .map(|&tier| {
                let subscribers = self
                    .subscribers
                    .iter()
                    .filter(|s| s.is_paying() && s.tier == tier)
                    .count() as u32;
                TierRevenue {
                    tier,
                    name: tier.display_name(),
                    price_cents: tier.monthly_price_cents(),
                    subscribers,
                    revenue_cents: i64::from(subscribers) * tier.monthly_price_cents(),
                }
            })
            .collect()
    }

    /// MRR, churn, per-tier breakdown and the newest `recent` events.
    pub fn summary(&self, recent: usize) -> RevenueSummary {
        let mut events = self.events();
        let event_count = events.len();
        let recent_events = events.split_off(event_count.saturating_sub(recent));

        RevenueSummary {
            mrr_cents: self.mrr_cents(),
            churn: self.churn(),
            by_tier: self.revenue_by_tier(),
            event_count,
            recent_events,
        }
    }

    /// Churn for the month containing `now`.
    pub fn churn(&self) -> ChurnReport {
        let now = self.clock.now();
        let (year, month) = (now.year(), now.month());

        let (mut cancellations, mut new_subscriptions) = (0u32, 0u32);
        for event in self
            .events_lock()
            .iter()
            .filter(|e| e.timestamp.year() == year && e.timestamp.month() == month)
        {
            match event.event_type {
                RevenueEventType::Cancellation => cancellations += 1,
                RevenueEventType::SubscriptionStart => new_subscriptions += 1,
                RevenueEventType::Renewal => {}
            }
        }

        let current_active = self.subscribers.iter().filter(|s| s.is_paying()).count() as i64;
        let start_active = current_active + i64::from(cancellations) - i64::from(new_subscriptions);
        let churn_rate_pct = if start_active > 0 {
            (f64::from(cancellations) / start_active as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        ChurnReport {
            year,
            month,
            cancellations,
            new_subscriptions,
            start_active: start_active.max(0) as u32,
            churn_rate_pct,
        }
    }
}

#[async_trait]
impl RevenueLedger for InMemoryRevenueLedger {
    async fn record_subscription_start(&self, email: &str, tier: Tier) -> Result<()> {
        self.track(RevenueEventType::SubscriptionStart, email, tier, None);
        Ok(())
    }

    async fn record_renewal(&self, email: &str, tier: Tier) -> Result<()> {
        self.track(RevenueEventType::Renewal, email, tier, Some(tier));
        Ok(())
    }

    async fn record_cancellation(&self, email: &str, previous_tier: Tier) -> Result<()> {
        self.track(
            RevenueEventType::Cancellation,
            email,
            Tier::Free,
            Some(previous_tier),
        );
        Ok(())
    }

    async fn current_mrr_cents(&self) -> Result<i64> {
        Ok(self.mrr_cents())
    }

    async fn current_churn_rate(&self) -> Result<f64> {
        Ok(self.churn().churn_rate_pct)
    }
}
