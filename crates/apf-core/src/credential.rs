//! API credentials of the form `apf_{tier}_{32 lowercase hex}`.

use crate::ids::random_hex;
use crate::{Error, Result, Tier};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

pub const CREDENTIAL_PREFIX: &str = "apf";

static CREDENTIAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^apf_(free|pro|enterprise)_([a-f0-9]{32})$").expect("credential pattern compiles")
});

/// The 32-hex identifier part of a credential. Keys the usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First six hex characters, safe to log.
    pub fn short(&self) -> &str {
        self.0.get(..6).unwrap_or(&self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated API credential. Never stored; derived per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredential {
    tier: Tier,
    key_id: KeyId,
}

impl ApiCredential {
    /// Validate a raw token. The error never describes the expected shape.
    pub fn parse(token: &str) -> Result<Self> {
        let caps = CREDENTIAL_PATTERN
            .captures(token)
            .ok_or(Error::InvalidCredential)?;
        let tier = caps[1].parse::<Tier>()?;
        Ok(Self {
            tier,
            key_id: KeyId(caps[2].to_string()),
        })
    }

    /// Like [`ApiCredential::parse`], treating a missing or empty token as invalid.
    pub fn parse_opt(token: Option<&str>) -> Result<Self> {
        match token {
            Some(t) if !t.is_empty() => Self::parse(t),
            _ => Err(Error::InvalidCredential),
        }
    }

    /// Issue a fresh demo credential for the given tier.
    pub fn generate(tier: Tier) -> Self {
        Self {
            tier,
            key_id: KeyId(random_hex(32)),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// Truncated form kept in logs: `apf_pro_abcdef...`.
    pub fn redacted(&self) -> String {
        format!("{}_{}_{}...", CREDENTIAL_PREFIX, self.tier, self.key_id.short())
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", CREDENTIAL_PREFIX, self.tier, self.key_id)
    }
}

impl FromStr for ApiCredential {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
