//! Per-credential daily usage metering.
//!
//! Quotas use a fixed UTC calendar-day window: a counter is only valid for the
//! day it was last touched and is reset the first time it is observed on a
//! later day, whether by a read or a write. The quota check and the increment
//! for a key happen under one map-entry guard, so concurrent callers can never
//! push a key past its limit.

use crate::error::{BillingError, BillingResult};
use crate::ring::BoundedLog;
use apf_core::{ApiCredential, Clock, KeyId, Tier};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Usage log capacity.
pub const USAGE_LOG_CAPACITY: usize = 1_000;

/// First instant of the next UTC calendar day.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .unwrap_or(NaiveDate::MAX)
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Stored counter for one key id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCounter {
    pub date: NaiveDate,
    pub count: u32,
}

impl UsageCounter {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: today,
            count: 0,
        }
    }

    /// Reset the count if it belongs to an earlier day. Returns true on reset.
    pub fn reconcile(&mut self, today: NaiveDate) -> bool {
        if self.date == today {
            return false;
        }
        self.date = today;
        self.count = 0;
        true
    }
}

/// Quota view for one key on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub tier: Tier,
    pub date: NaiveDate,
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl UsageStats {
    fn from_counter(tier: Tier, counter: &UsageCounter, now: DateTime<Utc>) -> Self {
        let limit = tier.daily_limit();
        Self {
            tier,
            date: counter.date,
            count: counter.count,
            limit,
            remaining: limit.saturating_sub(counter.count),
            reset_at: next_utc_midnight(now),
        }
    }
}

/// Body of a usage write.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUsage {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub method: Option<String>,
    pub status: Option<u16>,
    #[serde(alias = "latency")]
    pub latency_ms: Option<u64>,
}

/// One metered call. The credential is stored redacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub api_key: String,
    pub tier: Tier,
    pub endpoint: String,
    pub method: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

pub struct UsageMeter {
    clock: Arc<dyn Clock>,
    counters: DashMap<KeyId, UsageCounter>,
    log: BoundedLog<LogEntry>,
}

impl UsageMeter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            counters: DashMap::new(),
            log: BoundedLog::new(USAGE_LOG_CAPACITY),
        }
    }

    /// Validate a raw credential token. Missing and empty tokens are invalid.
    pub fn parse_credential(&self, token: Option<&str>) -> BillingResult<ApiCredential> {
        Ok(ApiCredential::parse_opt(token)?)
    }

    /// Current quota for a key, resetting a stale counter as a side effect.
    pub fn get_usage(&self, key_id: &KeyId, tier: Tier) -> UsageStats {
        let now = self.clock.now();
        let today = now.date_naive();
        let mut counter = self
            .counters
            .entry(key_id.clone())
            .or_insert_with(|| UsageCounter::new(today));
        if counter.reconcile(today) {
            debug!(key = %key_id.short(), %today, "Usage counter reset for new day");
        }
        UsageStats::from_counter(tier, &counter, now)
    }

    /// Meter one call: validate, check quota, increment and log.
    ///
    /// A rejected call mutates nothing. On rate limit the current stats are
    /// attached to the error.
    pub fn record(&self, request: RecordUsage) -> BillingResult<UsageStats> {
        let RecordUsage {
            api_key,
            endpoint,
            method,
            status,
            latency_ms,
        } = request;

        let (Some(api_key), Some(endpoint), Some(method), Some(status)) = (
            api_key.filter(|s| !s.is_empty()),
            endpoint.filter(|s| !s.is_empty()),
            method.filter(|s| !s.is_empty()),
            status,
        ) else {
            return Err(BillingError::MissingFields("apiKey, endpoint, method, status"));
        };

        let credential = ApiCredential::parse(&api_key)?;
        let tier = credential.tier();
        let now = self.clock.now();
        let today = now.date_naive();

        let stats = {
            let mut counter = self
                .counters
                .entry(credential.key_id().clone())
                .or_insert_with(|| UsageCounter::new(today));
            counter.reconcile(today);

            let before = UsageStats::from_counter(tier, &counter, now);
            if before.remaining == 0 {
                info!(
                    api_key = %credential.redacted(),
                    limit = before.limit,
                    "Daily rate limit exceeded"
                );
                return Err(BillingError::RateLimited(before));
            }

            counter.count += 1;
            UsageStats::from_counter(tier, &counter, now)
        };

        self.log.push(LogEntry {
            timestamp: now,
            api_key: credential.redacted(),
            tier,
            endpoint,
            method,
            status,
            latency_ms,
        });

        debug!(
            api_key = %credential.redacted(),
            count = stats.count,
            remaining = stats.remaining,
            "Usage recorded"
        );
        Ok(stats)
    }

    /// Newest `n` log entries, oldest first.
    pub fn recent_logs(&self, n: usize) -> Vec<LogEntry> {
        self.log.recent(n)
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Number of key ids observed so far.
    pub fn tracked_keys(&self) -> usize {
        self.counters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apf_core::ManualClock;
    use chrono::{Duration, TimeZone};

    const PRO_KEY: &str = "apf_pro_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const FREE_KEY: &str = "apf_free_0123456789abcdef0123456789abcdef";

    fn meter_at(start: DateTime<Utc>) -> (Arc<ManualClock>, UsageMeter) {
        let clock = Arc::new(ManualClock::new(start));
        let meter = UsageMeter::new(clock.clone());
        (clock, meter)
    }

    fn call(key: &str) -> RecordUsage {
        RecordUsage {
            api_key: Some(key.to_string()),
            endpoint: Some("/api/varieties".to_string()),
            method: Some("GET".to_string()),
            status: Some(200),
            latency_ms: Some(12),
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_next_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_utc_midnight(now),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_pro_quota_exhausts_at_limit() {
        let (_, meter) = meter_at(noon());

        for _ in 0..999 {
            meter.record(call(PRO_KEY)).unwrap();
        }
        let last = meter.record(call(PRO_KEY)).unwrap();
        assert_eq!(last.count, 1_000);
        assert_eq!(last.remaining, 0);

        let err = meter.record(call(PRO_KEY)).unwrap_err();
        assert_eq!(err.code(), "rate_limit_exceeded");
        let usage = err.usage().unwrap();
        assert_eq!(usage.remaining, 0);
        assert_eq!(usage.count, 1_000);

        let cred = ApiCredential::parse(PRO_KEY).unwrap();
        assert_eq!(meter.get_usage(cred.key_id(), cred.tier()).count, 1_000);
        assert_eq!(meter.log_len(), 1_000);
    }

    #[test]
    fn test_counter_resets_across_utc_midnight() {
        let just_before = Utc.with_ymd_and_hms(2026, 2, 24, 23, 59, 59).unwrap();
        let (clock, meter) = meter_at(just_before);

        for _ in 0..50 {
            meter.record(call(FREE_KEY)).unwrap();
        }
        assert!(meter.record(call(FREE_KEY)).is_err());

        clock.advance(Duration::seconds(2));
        let cred = ApiCredential::parse(FREE_KEY).unwrap();
        let stats = meter.get_usage(cred.key_id(), cred.tier());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.remaining, 50);
        assert_eq!(stats.date, NaiveDate::from_ymd_opt(2026, 2, 25).unwrap());
        assert_eq!(
            stats.reset_at,
            Utc.with_ymd_and_hms(2026, 2, 26, 0, 0, 0).unwrap()
        );

        assert_eq!(meter.record(call(FREE_KEY)).unwrap().count, 1);
    }

    #[test]
    fn test_invalid_credential_touches_nothing() {
        let (_, meter) = meter_at(noon());
        let err = meter
            .record(call("apf_pro_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_api_key");
        assert_eq!(meter.tracked_keys(), 0);
        assert_eq!(meter.log_len(), 0);

        assert!(meter.parse_credential(None).is_err());
        assert!(meter.parse_credential(Some("")).is_err());
        assert_eq!(meter.tracked_keys(), 0);
    }

    #[test]
    fn test_missing_fields_rejected_before_credential() {
        let (_, meter) = meter_at(noon());
        let mut req = call("not-a-key");
        req.method = None;
        assert_eq!(meter.record(req).unwrap_err().code(), "missing_fields");

        let mut req = call(PRO_KEY);
        req.endpoint = Some(String::new());
        assert_eq!(meter.record(req).unwrap_err().code(), "missing_fields");
        assert_eq!(meter.tracked_keys(), 0);
    }

    #[test]
    fn test_log_entry_is_redacted() {
        let (_, meter) = meter_at(noon());
        meter.record(call(PRO_KEY)).unwrap();
        let logs = meter.recent_logs(10);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].api_key, "apf_pro_aaaaaa...");
        assert_eq!(logs[0].latency_ms, Some(12));
    }

    #[test]
    fn test_usage_log_is_bounded() {
        let (_, meter) = meter_at(noon());
        for i in 0..1_200 {
            let key = ApiCredential::generate(Tier::Enterprise).to_string();
            let mut req = call(&key);
            req.status = Some(200 + (i % 3) as u16);
            meter.record(req).unwrap();
        }
        assert_eq!(meter.log_len(), USAGE_LOG_CAPACITY);
    }

    #[test]
    fn test_record_usage_deserializes_camel_case() {
        let req: RecordUsage = serde_json::from_str(
            r#"{"apiKey":"k","endpoint":"/x","method":"POST","status":201,"latencyMs":5}"#,
        )
        .unwrap();
        assert_eq!(req.status, Some(201));
        assert_eq!(req.latency_ms, Some(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_never_exceed_limit() {
        let (_, meter) = meter_at(noon());
        let meter = Arc::new(meter);

        let mut handles = Vec::new();
        for _ in 0..80 {
            let meter = meter.clone();
            handles.push(tokio::spawn(async move { meter.record(call(FREE_KEY)).is_ok() }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, Tier::Free.daily_limit());
    }
}
