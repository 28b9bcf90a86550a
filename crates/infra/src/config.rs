//! Engine configuration: retry policy, reservation lifetime, workflow policies
//! and background schedule.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Backoff strategy between compare-and-swap retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^(attempt-1)
    Exponential,
    /// Linear backoff: base * attempt
    Linear,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential
    }
}

/// Bounded retry policy for optimistic concurrency conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Jitter factor (0.0-1.0) applied around the computed delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(50),
            strategy: BackoffStrategy::Exponential,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Single attempt: conflicts surface immediately.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            jitter: 0.0,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
            jitter: 0.1,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_secs_f64() * 1000.0;
        let max_ms = self.max_delay.as_secs_f64() * 1000.0;

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => {
                let exp = 2_f64.powi(attempt.saturating_sub(1).min(30) as i32);
                (base_ms * exp).min(max_ms)
            }
            BackoffStrategy::Linear => (base_ms * f64::from(attempt)).min(max_ms),
        };

        // Deterministic spread so colliding writers do not retry in lockstep.
        let jitter_range = delay_ms * self.jitter.clamp(0.0, 1.0);
        let spread = ((f64::from(attempt) * 17.0) % 100.0) / 100.0;
        let jitter = jitter_range * (spread - 0.5) * 2.0;

        Duration::from_secs_f64((delay_ms + jitter).max(0.0) / 1000.0)
    }
}

/// What to do when `reserve` is called for a (product, order) pair that
/// already holds an active reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReservationPolicy {
    /// Fail with `AlreadyProcessed`.
    #[default]
    Reject,
    /// Return the existing reservation if the quantity matches, else fail.
    Idempotent,
    /// Add the requested quantity to the existing reservation.
    Merge,
}

impl FromStr for DuplicateReservationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "idempotent" => Ok(Self::Idempotent),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown duplicate reservation policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub retry: RetryPolicy,
    pub reservation_ttl: Duration,
    pub duplicate_reservation: DuplicateReservationPolicy,
    pub bulk_item_timeout: Duration,
    pub require_distinct_approver: bool,
    pub expiry_sweep_interval: Duration,
    pub reorder_scan_interval: Duration,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            reservation_ttl: Duration::from_secs(30 * 60),
            duplicate_reservation: DuplicateReservationPolicy::Reject,
            bulk_item_timeout: Duration::from_secs(5),
            require_distinct_approver: true,
            expiry_sweep_interval: Duration::from_secs(60),
            reorder_scan_interval: Duration::from_secs(15 * 60),
        }
    }
}

impl InventoryConfig {
    /// Defaults overridden by `STOCK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = parsed::<u32>(&lookup, "STOCK_RETRY_MAX_ATTEMPTS") {
            cfg.retry.max_attempts = v;
        }
        if let Some(v) = parsed::<u64>(&lookup, "STOCK_RESERVATION_TTL_SECS") {
            cfg.reservation_ttl = Duration::from_secs(v);
        }
        if let Some(v) = parsed::<DuplicateReservationPolicy>(&lookup, "STOCK_DUPLICATE_RESERVATION") {
            cfg.duplicate_reservation = v;
        }
        if let Some(v) = parsed::<u64>(&lookup, "STOCK_BULK_ITEM_TIMEOUT_MS") {
            cfg.bulk_item_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parsed::<bool>(&lookup, "STOCK_REQUIRE_DISTINCT_APPROVER") {
            cfg.require_distinct_approver = v;
        }
        if let Some(v) = parsed::<u64>(&lookup, "STOCK_EXPIRY_SWEEP_SECS") {
            cfg.expiry_sweep_interval = Duration::from_secs(v);
        }
        if let Some(v) = parsed::<u64>(&lookup, "STOCK_REORDER_SCAN_SECS") {
            cfg.reorder_scan_interval = Duration::from_secs(v);
        }

        cfg
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    pub fn with_duplicate_reservation(mut self, policy: DuplicateReservationPolicy) -> Self {
        self.duplicate_reservation = policy;
        self
    }

    pub fn with_bulk_item_timeout(mut self, timeout: Duration) -> Self {
        self.bulk_item_timeout = timeout;
        self
    }

    pub fn with_distinct_approver(mut self, required: bool) -> Self {
        self.require_distinct_approver = required;
        self
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "ignoring unparsable config value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::exponential(10, Duration::from_millis(10), Duration::from_millis(50))
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(40));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(50));
    }

    #[test]
    fn no_retry_still_makes_one_attempt() {
        assert_eq!(RetryPolicy::no_retry().attempts(), 1);
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).attempts(), 1);
    }

    #[test]
    fn lookup_overrides_defaults_and_ignores_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("STOCK_RETRY_MAX_ATTEMPTS", "9"),
            ("STOCK_DUPLICATE_RESERVATION", "Merge"),
            ("STOCK_RESERVATION_TTL_SECS", "not-a-number"),
            ("STOCK_REQUIRE_DISTINCT_APPROVER", "false"),
        ]);
        let cfg = InventoryConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.retry.max_attempts, 9);
        assert_eq!(cfg.duplicate_reservation, DuplicateReservationPolicy::Merge);
        assert_eq!(cfg.reservation_ttl, InventoryConfig::default().reservation_ttl);
        assert!(!cfg.require_distinct_approver);
    }
}
