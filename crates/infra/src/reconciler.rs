//! Read-only drift report between the catalog's legacy stock field and the
//! ledger, plus a check of the ledger's reserved stock against the
//! reservation records that should account for it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use stockledger_core::{DomainError, DomainResult, ProductId};
use stockledger_inventory::{StockRecord, StockStatus};

use crate::ledger::StockLedger;
use crate::store::{Catalog, CatalogProduct, ReservationStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMismatch {
    pub product_id: ProductId,
    pub sku: String,
    pub legacy_stock_quantity: i64,
    pub ledger_physical_stock: i64,
    /// `ledger - legacy`.
    pub difference: i64,
}

/// Reserved stock the ledger holds that active reservations do not explain,
/// or the reverse. Left behind when a compensating write is lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservedDrift {
    pub product_id: ProductId,
    pub sku: String,
    pub ledger_reserved_stock: i64,
    pub active_reserved_outstanding: i64,
    /// `ledger - reservations`.
    pub difference: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub in_stock: usize,
    pub low_stock: usize,
    pub critical: usize,
    pub out_of_stock: usize,
}

impl StatusCounts {
    fn add(&mut self, status: StockStatus) {
        match status {
            StockStatus::InStock => self.in_stock += 1,
            StockStatus::LowStock => self.low_stock += 1,
            StockStatus::Critical => self.critical += 1,
            StockStatus::OutOfStock => self.out_of_stock += 1,
        }
    }
}

/// Monetary totals in the smallest currency unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InventoryValuation {
    pub value_at_cost: u64,
    pub value_at_retail: u64,
    /// `(retail - cost) / cost` over products with both prices known.
    pub markup_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub generated_at: DateTime<Utc>,
    pub products_checked: usize,
    pub mismatch_count: usize,
    pub mismatches: Vec<StockMismatch>,
    /// Catalog products the ledger has no record for.
    pub missing_ledger_records: Vec<ProductId>,
    /// Ledger records with no catalog product.
    pub orphan_ledger_records: Vec<ProductId>,
    pub reserved_drift: Vec<ReservedDrift>,
    pub status_counts: StatusCounts,
    pub valuation: InventoryValuation,
}

pub struct ConsistencyReconciler {
    ledger: Arc<StockLedger>,
    reservations: Arc<dyn ReservationStore>,
    catalog: Arc<dyn Catalog>,
}

impl ConsistencyReconciler {
    pub fn new(ledger: Arc<StockLedger>, reservations: Arc<dyn ReservationStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            ledger,
            reservations,
            catalog,
        }
    }

    /// Build the report. Nothing is written.
    pub fn run(&self) -> DomainResult<ConsistencyReport> {
        let records = self.ledger.list_stock()?;
        let mut catalog = self.catalog.list()?;
        catalog.sort_by(|a, b| a.sku.cmp(&b.sku));

        let by_product: HashMap<ProductId, &StockRecord> = records.iter().map(|r| (r.product_id, r)).collect();

        let mut mismatches = Vec::new();
        let mut missing_ledger_records = Vec::new();
        for product in &catalog {
            let Some(record) = by_product.get(&product.product_id) else {
                missing_ledger_records.push(product.product_id);
                continue;
            };
            let Some(legacy) = product.legacy_stock_quantity else {
                continue;
            };
            if legacy != record.physical_stock() {
                mismatches.push(StockMismatch {
                    product_id: product.product_id,
                    sku: record.sku.clone(),
                    legacy_stock_quantity: legacy,
                    ledger_physical_stock: record.physical_stock(),
                    difference: record.physical_stock() - legacy,
                });
            }
        }

        let catalog_ids: HashMap<ProductId, &CatalogProduct> = catalog.iter().map(|p| (p.product_id, p)).collect();
        let orphan_ledger_records = records
            .iter()
            .filter(|r| !catalog_ids.contains_key(&r.product_id))
            .map(|r| r.product_id)
            .collect();

        let reserved_drift = self.reserved_drift(&records)?;

        let mut status_counts = StatusCounts::default();
        for record in &records {
            status_counts.add(record.stock_status());
        }

        let valuation = valuation(&records, &catalog_ids)?;

        let report = ConsistencyReport {
            generated_at: self.ledger.now(),
            products_checked: catalog.len(),
            mismatch_count: mismatches.len(),
            mismatches,
            missing_ledger_records,
            orphan_ledger_records,
            reserved_drift,
            status_counts,
            valuation,
        };
        info!(
            products = report.products_checked,
            mismatches = report.mismatch_count,
            missing = report.missing_ledger_records.len(),
            reserved_drift = report.reserved_drift.len(),
            "consistency report generated"
        );
        if !report.reserved_drift.is_empty() {
            warn!(products = report.reserved_drift.len(), "reserved stock does not match active reservations");
        }
        Ok(report)
    }

    fn reserved_drift(&self, records: &[StockRecord]) -> DomainResult<Vec<ReservedDrift>> {
        let mut outstanding: HashMap<ProductId, i64> = HashMap::new();
        for reservation in self.reservations.list()? {
            *outstanding.entry(reservation.product_id).or_default() += reservation.outstanding();
        }

        let mut drift: Vec<ReservedDrift> = records
            .iter()
            .filter_map(|record| {
                let active = outstanding.get(&record.product_id).copied().unwrap_or(0);
                (active != record.reserved_stock()).then(|| ReservedDrift {
                    product_id: record.product_id,
                    sku: record.sku.clone(),
                    ledger_reserved_stock: record.reserved_stock(),
                    active_reserved_outstanding: active,
                    difference: record.reserved_stock() - active,
                })
            })
            .collect();
        drift.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(drift)
    }
}

fn valuation(
    records: &[StockRecord],
    catalog: &HashMap<ProductId, &CatalogProduct>,
) -> DomainResult<InventoryValuation> {
    let overflow = || DomainError::invariant("inventory valuation overflow");
    let mut totals = InventoryValuation::default();
    let (mut priced_cost, mut priced_retail) = (0u64, 0u64);

    for record in records {
        let Some(product) = catalog.get(&record.product_id) else {
            continue;
        };
        let units = u64::try_from(record.physical_stock()).map_err(|_| overflow())?;

        let cost = product
            .unit_cost
            .map(|c| c.checked_mul(units).ok_or_else(overflow))
            .transpose()?;
        let retail = product
            .unit_price
            .map(|p| p.checked_mul(units).ok_or_else(overflow))
            .transpose()?;

        if let Some(c) = cost {
            totals.value_at_cost = totals.value_at_cost.checked_add(c).ok_or_else(overflow)?;
        }
        if let Some(r) = retail {
            totals.value_at_retail = totals.value_at_retail.checked_add(r).ok_or_else(overflow)?;
        }
        if let (Some(c), Some(r)) = (cost, retail) {
            priced_cost = priced_cost.checked_add(c).ok_or_else(overflow)?;
            priced_retail = priced_retail.checked_add(r).ok_or_else(overflow)?;
        }
    }

    if priced_cost > 0 {
        totals.markup_ratio = Some((priced_retail as f64 - priced_cost as f64) / priced_cost as f64);
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;
    use stockledger_core::{ExpectedVersion, ManualClock, OrderId, UserId};
    use stockledger_inventory::{StockReservation, StockThresholds};

    use crate::audit_trail::AuditTrail;
    use crate::config::RetryPolicy;
    use crate::notify::Notifier;
    use crate::store::{InMemoryAuditStore, InMemoryCatalog, InMemoryReservationStore, InMemoryStockStore};

    fn ledger(stock: InMemoryStockStore) -> Arc<StockLedger> {
        Arc::new(StockLedger::new(
            Arc::new(stock),
            AuditTrail::new(Arc::new(InMemoryAuditStore::new())),
            Notifier::default(),
            Arc::new(ManualClock::new(Utc::now())),
            RetryPolicy::fixed(2, Duration::ZERO),
        ))
    }

    fn catalog_product(sku: &str, legacy: Option<i64>, cost: Option<u64>, price: Option<u64>) -> CatalogProduct {
        CatalogProduct {
            product_id: ProductId::new(),
            sku: sku.to_string(),
            name: sku.to_lowercase(),
            legacy_stock_quantity: legacy,
            unit_cost: cost,
            unit_price: price,
        }
    }

    #[test]
    fn reports_drift_missing_records_and_value() {
        let ledger = ledger(InMemoryStockStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let thresholds = StockThresholds {
            min_stock_level: 2,
            reorder_point: 5,
            reorder_quantity: 10,
            max_stock_level: 50,
        };

        let a = catalog_product("A", Some(10), Some(100), Some(150));
        let b = catalog_product("B", Some(7), Some(200), Some(300));
        let c = catalog_product("C", Some(1), None, None);
        for p in [&a, &b, &c] {
            catalog.upsert(p.clone()).unwrap();
        }
        ledger.register_product(a.product_id, "A", 10, thresholds, UserId::new()).unwrap();
        ledger.register_product(b.product_id, "B", 4, thresholds, UserId::new()).unwrap();

        let report = ConsistencyReconciler::new(ledger, Arc::new(InMemoryReservationStore::new()), catalog)
            .run()
            .unwrap();

        assert_eq!(report.products_checked, 3);
        assert_eq!(report.mismatch_count, 1);
        assert_eq!(report.mismatches[0].product_id, b.product_id);
        assert_eq!(report.mismatches[0].difference, -3);
        assert_eq!(report.missing_ledger_records, vec![c.product_id]);
        assert!(report.reserved_drift.is_empty());
        assert_eq!(report.status_counts.in_stock, 1);
        assert_eq!(report.status_counts.low_stock, 1);
        assert_eq!(report.valuation.value_at_cost, 10 * 100 + 4 * 200);
        assert_eq!(report.valuation.value_at_retail, 10 * 150 + 4 * 300);
        assert_eq!(report.valuation.markup_ratio, Some(0.5));
    }

    #[test]
    fn unprovisioned_ledger_is_an_error_not_an_empty_report() {
        let ledger = ledger(InMemoryStockStore::unprovisioned());
        let reconciler = ConsistencyReconciler::new(
            ledger,
            Arc::new(InMemoryReservationStore::new()),
            Arc::new(InMemoryCatalog::new()),
        );
        assert!(matches!(reconciler.run(), Err(DomainError::DependencyUnavailable(_))));
    }

    #[test]
    fn reserved_stock_without_reservation_rows_is_flagged() {
        let ledger = ledger(InMemoryStockStore::new());
        let reservations = Arc::new(InMemoryReservationStore::new());
        let thresholds = StockThresholds::default();
        let (tracked, leaked) = (ProductId::new(), ProductId::new());
        ledger.register_product(tracked, "TRACKED", 20, thresholds, UserId::new()).unwrap();
        ledger.register_product(leaked, "LEAKED", 20, thresholds, UserId::new()).unwrap();

        let now = Utc::now();
        let row = StockReservation::open(tracked, OrderId::new(), 4, now, now + ChronoDuration::minutes(5)).unwrap();
        reservations.insert_active(row).unwrap();
        ledger.apply_delta(tracked, 0, 4, ExpectedVersion::Exact(1)).unwrap();
        // Reserved on the ledger with no reservation behind it.
        ledger.apply_delta(leaked, 0, 6, ExpectedVersion::Exact(1)).unwrap();

        let report = ConsistencyReconciler::new(ledger, reservations, Arc::new(InMemoryCatalog::new()))
            .run()
            .unwrap();

        assert_eq!(report.reserved_drift.len(), 1);
        let drift = &report.reserved_drift[0];
        assert_eq!(drift.product_id, leaked);
        assert_eq!(drift.ledger_reserved_stock, 6);
        assert_eq!(drift.active_reserved_outstanding, 0);
        assert_eq!(drift.difference, 6);
    }
}
