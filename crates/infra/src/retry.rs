//! Bounded retry around optimistic-concurrency conflicts.

use std::thread;

use tracing::debug;

use stockledger_core::{DomainError, DomainResult};

use crate::config::RetryPolicy;

/// Run `op` until it succeeds, fails with anything other than
/// `ConcurrentModification`, or the policy's attempts are used up.
///
/// `op` must re-read whatever state it depends on: each attempt starts from
/// fresh data.
pub fn with_retry<T>(policy: &RetryPolicy, label: &str, mut op: impl FnMut() -> DomainResult<T>) -> DomainResult<T> {
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op() {
            Err(DomainError::ConcurrentModification(msg)) if attempt < attempts => {
                let delay = policy.delay_for_attempt(attempt);
                debug!(operation = label, attempt, delay_ms = delay.as_millis() as u64, %msg, "write conflict, retrying");
                thread::sleep(delay);
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn retries_conflicts_until_success() {
        let policy = RetryPolicy::fixed(4, Duration::ZERO);
        let mut calls = 0;
        let result = with_retry(&policy, "test", || {
            calls += 1;
            if calls < 3 {
                Err(DomainError::concurrent_modification("busy"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::fixed(2, Duration::ZERO);
        let mut calls = 0;
        let result: DomainResult<()> = with_retry(&policy, "test", || {
            calls += 1;
            Err(DomainError::concurrent_modification("busy"))
        });
        assert!(matches!(result, Err(DomainError::ConcurrentModification(_))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let policy = RetryPolicy::fixed(5, Duration::ZERO);
        let mut calls = 0;
        let result: DomainResult<()> = with_retry(&policy, "test", || {
            calls += 1;
            Err(DomainError::insufficient_stock(3, 1))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
