//! Subscription tiers and their fixed commercial terms.

use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A product tier. Determines daily quota and monthly price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Enterprise];
    pub const PAID: [Tier; 2] = [Tier::Pro, Tier::Enterprise];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Pro => "Pro",
            Tier::Enterprise => "Enterprise",
        }
    }

    /// Requests allowed per UTC calendar day.
    pub fn daily_limit(self) -> u32 {
        match self {
            Tier::Free => 50,
            Tier::Pro => 1_000,
            Tier::Enterprise => 10_000,
        }
    }

    /// Monthly price in US cents.
    pub fn monthly_price_cents(self) -> i64 {
        match self {
            Tier::Free => 0,
            Tier::Pro => 499,
            Tier::Enterprise => 1_999,
        }
    }

    /// Payment processor price id. Free has none.
    pub fn price_id(self) -> Option<&'static str> {
        match self {
            Tier::Free => None,
            Tier::Pro => Some("price_applefarm_pro_499"),
            Tier::Enterprise => Some("price_applefarm_ent_1999"),
        }
    }

    pub fn is_paid(self) -> bool {
        self.monthly_price_cents() > 0
    }

    /// Comma-separated list of valid tier slugs, for error messages.
    pub fn valid_list() -> String {
        Tier::join(&Tier::ALL)
    }

    pub fn join(tiers: &[Tier]) -> String {
        tiers
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parse a request body's `tier` field, whatever JSON type it arrived as.
    /// A missing or null field is an invalid (empty) tier.
    pub fn from_json(value: Option<&Value>) -> Result<Tier, Error> {
        match value {
            None | Some(Value::Null) => Err(Error::InvalidTier(String::new())),
            Some(Value::String(raw)) => raw.parse(),
            Some(other) => Err(Error::InvalidTier(other.to_string())),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "enterprise" => Ok(Tier::Enterprise),
            other => Err(Error::InvalidTier(other.to_string())),
        }
    }
}
