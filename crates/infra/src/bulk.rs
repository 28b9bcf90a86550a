//! Per-item isolated batch execution.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use stockledger_core::DomainResult;

/// Items run concurrently in waves of this size.
pub const BULK_PARALLELISM: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    /// Position of the item in the submitted batch.
    pub index: usize,
    pub id: String,
    pub code: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkResult<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BulkFailure>,
}

impl<T> Default for BulkResult<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Run `op` over every item, each on its own thread with `timeout` to finish.
///
/// A failing or slow item is reported in `failed` and never stops the rest.
/// An item that times out is not cancelled: its thread may still complete the
/// operation in the background, so callers should treat a timeout as
/// "outcome unknown" rather than "not applied".
pub fn run_bulk<I, T, F>(label: &str, items: Vec<(String, I)>, timeout: Duration, op: F) -> BulkResult<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> DomainResult<T> + Send + Sync + 'static,
{
    let op = Arc::new(op);
    let total = items.len();
    let mut result = BulkResult::default();
    let mut items = items.into_iter().enumerate().peekable();

    while items.peek().is_some() {
        let wave_started = Instant::now();
        let mut pending = Vec::with_capacity(BULK_PARALLELISM);

        for (index, (id, item)) in items.by_ref().take(BULK_PARALLELISM) {
            let (tx, rx) = mpsc::channel();
            let op = Arc::clone(&op);
            let spawned = thread::Builder::new()
                .name(format!("bulk-{label}-{index}"))
                .spawn(move || {
                    let _ = tx.send(op(item));
                });
            match spawned {
                Ok(_) => pending.push((index, id, rx)),
                Err(e) => result.failed.push(BulkFailure {
                    index,
                    id,
                    code: "dependency_unavailable",
                    reason: format!("could not start worker: {e}"),
                }),
            }
        }

        for (index, id, rx) in pending {
            let remaining = timeout.saturating_sub(wave_started.elapsed());
            match rx.recv_timeout(remaining) {
                Ok(Ok(value)) => result.succeeded.push(value),
                Ok(Err(e)) => result.failed.push(BulkFailure {
                    index,
                    id,
                    code: e.code(),
                    reason: e.to_string(),
                }),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    warn!(operation = label, index, item = %id, "bulk item timed out");
                    result.failed.push(BulkFailure {
                        index,
                        id,
                        code: "timeout",
                        reason: format!("item did not finish within {} ms", timeout.as_millis()),
                    });
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => result.failed.push(BulkFailure {
                    index,
                    id,
                    code: "invariant_violation",
                    reason: "worker exited without a result".to_string(),
                }),
            }
        }
    }

    result.failed.sort_by_key(|f| f.index);
    info!(
        operation = label,
        total,
        succeeded = result.succeeded.len(),
        failed = result.failed.len(),
        "bulk run finished"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::DomainError;

    #[test]
    fn failures_do_not_abort_the_batch() {
        let items: Vec<(String, i64)> = (0..20).map(|i| (format!("item-{i}"), i)).collect();
        let result = run_bulk("test", items, Duration::from_secs(5), |n| {
            if n % 5 == 0 {
                Err(DomainError::validation(format!("{n} is unlucky")))
            } else {
                Ok(n * 2)
            }
        });

        assert_eq!(result.succeeded.len(), 16);
        assert_eq!(result.failed.len(), 4);
        assert_eq!(result.failed[0].id, "item-0");
        assert_eq!(result.failed[0].code, "validation_error");
    }

    #[test]
    fn slow_item_times_out_alone() {
        let items = vec![("fast".to_string(), 0u64), ("slow".to_string(), 2_000)];
        let result = run_bulk("test", items, Duration::from_millis(200), |ms| {
            thread::sleep(Duration::from_millis(ms));
            Ok(ms)
        });

        assert_eq!(result.succeeded, vec![0]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].id, "slow");
        assert_eq!(result.failed[0].code, "timeout");
    }
}
