//! Application state shared across handlers.

use apf_billing::checkout::DEFAULT_CHECKOUT_BASE_URL;
use apf_billing::{CheckoutProcessor, InMemoryRevenueLedger, LedgerNotifier, SubscriptionLedger, UsageMeter};
use apf_core::Clock;
use std::sync::Arc;

/// Server settings the handlers need.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Origin used for default checkout redirects when the request has no `Host`.
    pub public_url: String,
    pub checkout_base_url: String,
    pub webhook_history_limit: usize,
    pub ledger_queue_capacity: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8080".to_string(),
            checkout_base_url: DEFAULT_CHECKOUT_BASE_URL.to_string(),
            webhook_history_limit: 20,
            ledger_queue_capacity: 256,
        }
    }
}

/// Application state shared across all handlers.
pub struct AppState {
    pub usage: UsageMeter,
    pub subscriptions: SubscriptionLedger,
    pub checkout: CheckoutProcessor,
    pub revenue: Arc<InMemoryRevenueLedger>,
    pub settings: ApiSettings,
}

impl AppState {
    /// Empty in-memory stores. Must be called inside a tokio runtime.
    pub fn in_memory(clock: Arc<dyn Clock>, settings: ApiSettings) -> Self {
        let revenue = Arc::new(InMemoryRevenueLedger::new(clock.clone()));
        let notifier = LedgerNotifier::spawn(revenue.clone(), settings.ledger_queue_capacity);

        Self {
            usage: UsageMeter::new(clock.clone()),
            subscriptions: SubscriptionLedger::new(clock.clone(), revenue.clone(), notifier),
            checkout: CheckoutProcessor::new(clock, settings.checkout_base_url.clone()),
            revenue,
            settings,
        }
    }
}
