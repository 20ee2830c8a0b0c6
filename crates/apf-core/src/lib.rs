//! Apple Farm metering core
//!
//! Shared vocabulary for the usage meter, the subscription ledger and the
//! checkout processor: tiers, API credentials, prefixed identifiers, the
//! clock abstraction and the revenue-ledger port. This crate performs no I/O.

pub mod clock;
pub mod credential;
pub mod email;
pub mod error;
pub mod ids;
pub mod ports;
pub mod tier;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{ApiCredential, KeyId};
pub use error::{Error, Result};
pub use ids::*;
pub use tier::Tier;
