//! Usage metering, subscriptions and checkout for the Apple Farm API.
//!
//! Three independent components share one shape: an in-memory keyed store
//! whose time-derived state (day rollover, subscription expiry, session
//! expiry) is evaluated lazily whenever a record is touched.

pub mod checkout;
pub mod error;
pub mod notifier;
pub mod revenue;
pub mod ring;
pub mod subscriptions;
pub mod usage;
pub mod webhooks;

pub use checkout::{
    CheckoutOverview, CheckoutProcessor, CheckoutSession, CreateCheckout, CreatedCheckout,
    PaymentStatus, SessionStatus,
};
pub use error::{BillingError, BillingResult};
pub use notifier::LedgerNotifier;
pub use revenue::{ChurnReport, InMemoryRevenueLedger, RevenueEvent, RevenueSummary, TierRevenue};
pub use subscriptions::{
    Cancellation, SubscribeOutcome, SubscribeRequest, SubscriptionAggregate, SubscriptionLedger,
    SubscriptionRecord, SubscriptionStatus,
};
pub use usage::{LogEntry, RecordUsage, UsageMeter, UsageStats};
pub use webhooks::{WebhookAck, WebhookAction, WebhookEvent, WebhookEventType, WebhookLogEntry};
