//! Canonical stock records and the compare-and-swap mutation primitive.
//!
//! Every quantity change in the system goes through [`StockLedger::apply_delta`]:
//! read, check the expected version, compute the next composite
//! physical/reserved/available value, and write it back only if nobody else
//! wrote in between.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use stockledger_core::{Clock, DomainError, DomainResult, ExpectedVersion, ProductId, UserId, Versioned};
use stockledger_inventory::{
    AuditLogEntry, InventoryEvent, OperationType, StockHold, StockRecord, StockThresholds,
};

use crate::audit_trail::AuditTrail;
use crate::config::RetryPolicy;
use crate::notify::Notifier;
use crate::retry::with_retry;
use crate::store::{StockStore, StoreError};

/// A committed ledger write: the record before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerUpdate {
    pub before: StockRecord,
    pub after: StockRecord,
}

pub struct StockLedger {
    stock: Arc<dyn StockStore>,
    audit: AuditTrail,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl StockLedger {
    pub fn new(
        stock: Arc<dyn StockStore>,
        audit: AuditTrail,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            stock,
            audit,
            notifier,
            clock,
            retry,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn get_stock(&self, product_id: ProductId) -> DomainResult<StockRecord> {
        self.stock
            .get(product_id)?
            .ok_or_else(|| DomainError::not_found("stock_record", product_id))
    }

    /// Every stock record, ordered by SKU.
    pub fn list_stock(&self) -> DomainResult<Vec<StockRecord>> {
        let mut records = self.stock.list()?;
        records.sort_by(|a, b| a.sku.cmp(&b.sku).then(a.product_id.cmp(&b.product_id)));
        Ok(records)
    }

    /// Create the stock record for a product (version 1).
    pub fn register_product(
        &self,
        product_id: ProductId,
        sku: impl Into<String>,
        initial_physical: i64,
        thresholds: StockThresholds,
        actor: UserId,
    ) -> DomainResult<StockRecord> {
        let now = self.now();
        let record = StockRecord::register(product_id, sku, initial_physical, thresholds, now)?;

        match self.stock.insert(record.clone()) {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(DomainError::already_processed(format!(
                    "product {product_id} already has a stock record"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        info!(product_id = %product_id, sku = %record.sku, physical = initial_physical, "stock record registered");
        self.audit.record(AuditLogEntry::initial(&record, actor, now));
        self.notifier.publish(
            InventoryEvent::StockRegistered {
                product_id,
                sku: record.sku.clone(),
                physical_stock: initial_physical,
                occurred_at: now,
            },
            record.version(),
        );
        Ok(record)
    }

    /// Apply a composite quantity delta if the stored version still matches.
    ///
    /// The three stock fields move together; a delta that would make any of
    /// them negative, or push reserved above physical, is refused with
    /// `InvariantViolation` and nothing is written.
    pub fn apply_delta(
        &self,
        product_id: ProductId,
        physical_delta: i64,
        reserved_delta: i64,
        expected: ExpectedVersion,
    ) -> DomainResult<LedgerUpdate> {
        let before = self.get_stock(product_id)?;
        expected.check(Some(before.version()))?;

        let after = before.with_delta(physical_delta, reserved_delta, self.now())?;
        self.stock.compare_and_swap(before.version(), after.clone())?;

        debug!(
            product_id = %product_id,
            physical_delta,
            reserved_delta,
            version = after.version(),
            "ledger delta applied"
        );
        Ok(LedgerUpdate { before, after })
    }

    /// Read-compute-write loop around [`apply_delta`](Self::apply_delta).
    ///
    /// `plan` sees the freshest record on every attempt and returns the
    /// `(physical_delta, reserved_delta)` to apply, or a business error that
    /// ends the loop. Version conflicts are retried per the ledger's policy.
    pub fn update_with_retry(
        &self,
        product_id: ProductId,
        label: &str,
        mut plan: impl FnMut(&StockRecord) -> DomainResult<(i64, i64)>,
    ) -> DomainResult<LedgerUpdate> {
        with_retry(&self.retry, label, || {
            let current = self.get_stock(product_id)?;
            let (physical_delta, reserved_delta) = plan(&current)?;
            self.apply_delta(
                product_id,
                physical_delta,
                reserved_delta,
                ExpectedVersion::Exact(current.version()),
            )
        })
    }

    /// Replace reorder thresholds. Quantities are untouched.
    pub fn configure_thresholds(
        &self,
        product_id: ProductId,
        thresholds: StockThresholds,
        actor: UserId,
    ) -> DomainResult<LedgerUpdate> {
        let update = self.replace(product_id, "configure_thresholds", |r| r.with_thresholds(thresholds))?;
        info!(product_id = %product_id, reorder_point = thresholds.reorder_point, "thresholds updated");
        self.audit.record(AuditLogEntry::transition(
            OperationType::ThresholdUpdate,
            0,
            &update.before,
            &update.after,
            actor,
            self.now(),
        ));
        Ok(update)
    }

    /// Block new reservations until `until`.
    pub fn place_hold(
        &self,
        product_id: ProductId,
        reason: impl Into<String>,
        until: DateTime<Utc>,
        actor: UserId,
    ) -> DomainResult<LedgerUpdate> {
        let hold = StockHold {
            reason: reason.into(),
            until,
        };
        let now = self.now();
        let update = self.replace(product_id, "place_hold", |r| r.with_hold(Some(hold.clone()), now))?;
        info!(product_id = %product_id, reason = %hold.reason, until = %until, "stock hold placed");
        self.audit.record(
            AuditLogEntry::transition(OperationType::HoldPlaced, 0, &update.before, &update.after, actor, now)
                .with_notes(hold.reason),
        );
        Ok(update)
    }

    pub fn release_hold(&self, product_id: ProductId, actor: UserId) -> DomainResult<LedgerUpdate> {
        let now = self.now();
        let update = self.replace(product_id, "release_hold", |r| {
            if r.hold().is_none() {
                return Err(DomainError::validation(format!("product {product_id} has no stock hold")));
            }
            r.with_hold(None, now)
        })?;
        info!(product_id = %product_id, "stock hold released");
        self.audit.record(AuditLogEntry::transition(
            OperationType::HoldReleased,
            0,
            &update.before,
            &update.after,
            actor,
            now,
        ));
        Ok(update)
    }

    /// CAS write of a non-quantity change, retried on conflict.
    fn replace(
        &self,
        product_id: ProductId,
        label: &str,
        change: impl Fn(&StockRecord) -> DomainResult<StockRecord>,
    ) -> DomainResult<LedgerUpdate> {
        with_retry(&self.retry, label, || {
            let before = self.get_stock(product_id)?;
            let after = change(&before)?;
            self.stock.compare_and_swap(before.version(), after.clone())?;
            Ok(LedgerUpdate { before, after })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;
    use stockledger_core::ManualClock;

    use crate::store::{InMemoryAuditStore, InMemoryStockStore};

    fn ledger_with(stock: Arc<InMemoryStockStore>) -> StockLedger {
        StockLedger::new(
            stock,
            AuditTrail::new(Arc::new(InMemoryAuditStore::new())),
            Notifier::default(),
            Arc::new(ManualClock::new(Utc::now())),
            RetryPolicy::fixed(3, Duration::ZERO),
        )
    }

    fn ledger() -> StockLedger {
        ledger_with(Arc::new(InMemoryStockStore::new()))
    }

    #[test]
    fn apply_delta_moves_all_three_fields() {
        let ledger = ledger();
        let p = ProductId::new();
        ledger
            .register_product(p, "SKU-1", 20, StockThresholds::default(), UserId::new())
            .unwrap();

        let update = ledger.apply_delta(p, 0, 8, ExpectedVersion::Exact(1)).unwrap();
        assert_eq!(update.after.available_stock(), 12);
        assert_eq!(update.after.reserved_stock(), 8);
        assert_eq!(update.after.version(), 2);
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let ledger = ledger();
        let p = ProductId::new();
        ledger
            .register_product(p, "SKU-1", 5, StockThresholds::default(), UserId::new())
            .unwrap();
        ledger.apply_delta(p, 1, 0, ExpectedVersion::Exact(1)).unwrap();

        let err = ledger.apply_delta(p, 1, 0, ExpectedVersion::Exact(1)).unwrap_err();
        assert!(matches!(err, DomainError::ConcurrentModification(_)));
        assert_eq!(ledger.get_stock(p).unwrap().physical_stock(), 6);
    }

    #[test]
    fn invariant_breaking_delta_writes_nothing() {
        let ledger = ledger();
        let p = ProductId::new();
        ledger
            .register_product(p, "SKU-1", 5, StockThresholds::default(), UserId::new())
            .unwrap();

        let err = ledger.apply_delta(p, 0, 6, ExpectedVersion::Exact(1)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(ledger.get_stock(p).unwrap().version(), 1);
    }

    #[test]
    fn duplicate_registration_is_already_processed() {
        let ledger = ledger();
        let p = ProductId::new();
        ledger
            .register_product(p, "SKU-1", 5, StockThresholds::default(), UserId::new())
            .unwrap();
        let err = ledger
            .register_product(p, "SKU-1", 5, StockThresholds::default(), UserId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyProcessed(_)));
    }

    #[test]
    fn unprovisioned_storage_is_reported_not_zeroed() {
        let ledger = ledger_with(Arc::new(InMemoryStockStore::unprovisioned()));
        let err = ledger.get_stock(ProductId::new()).unwrap_err();
        assert!(matches!(err, DomainError::DependencyUnavailable(_)));
        assert!(matches!(ledger.list_stock(), Err(DomainError::DependencyUnavailable(_))));
    }

    #[test]
    fn holds_round_trip_without_touching_quantities() {
        let ledger = ledger();
        let p = ProductId::new();
        ledger
            .register_product(p, "SKU-1", 5, StockThresholds::default(), UserId::new())
            .unwrap();
        let until = ledger.now() + ChronoDuration::hours(1);

        let held = ledger.place_hold(p, "recall", until, UserId::new()).unwrap();
        assert_eq!(held.after.hold().map(|h| h.reason.as_str()), Some("recall"));
        assert_eq!(held.after.physical_stock(), 5);

        let released = ledger.release_hold(p, UserId::new()).unwrap();
        assert!(released.after.hold().is_none());
        assert!(matches!(
            ledger.release_hold(p, UserId::new()),
            Err(DomainError::Validation(_))
        ));
    }
}
