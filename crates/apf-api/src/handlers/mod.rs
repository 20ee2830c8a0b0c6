//! Request handlers organized by resource.

pub mod checkout;
pub mod health;
pub mod revenue;
pub mod subscriptions;
pub mod usage;
