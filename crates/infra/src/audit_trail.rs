//! Append-only audit trail over the audit store.

use std::sync::Arc;

use tracing::warn;

use stockledger_core::{DomainResult, ProductId};
use stockledger_inventory::AuditLogEntry;

use crate::query::{AuditFilter, AuditQuery, AuditSort, Filter, Page, SortKey};
use crate::store::AuditStore;

/// Records every stock-affecting change.
///
/// Writes are at-least-once visible: a failed append is logged and the stock
/// mutation that produced it still stands.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append an entry; returns whether the write landed.
    pub fn record(&self, entry: AuditLogEntry) -> bool {
        let (product_id, operation) = (entry.product_id, entry.operation_type);
        match self.store.append(entry) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    product_id = %product_id,
                    operation = operation.as_str(),
                    error = %e,
                    "audit write failed; stock change kept"
                );
                false
            }
        }
    }

    pub fn list(&self, query: &AuditQuery) -> DomainResult<Page<AuditLogEntry>> {
        Ok(query.run(self.store.list()?))
    }

    /// Full history of one product, oldest first.
    pub fn history(&self, product_id: ProductId) -> DomainResult<Vec<AuditLogEntry>> {
        let filter = AuditFilter {
            product_id: Some(product_id),
            ..Default::default()
        };
        let mut entries: Vec<AuditLogEntry> = self
            .store
            .list()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| AuditSort::VersionAfter.compare(a, b));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_core::UserId;
    use stockledger_inventory::{OperationType, StockRecord, StockThresholds};

    use crate::store::InMemoryAuditStore;

    #[test]
    fn failed_append_is_reported_not_raised() {
        let store = Arc::new(InMemoryAuditStore::unprovisioned());
        let trail = AuditTrail::new(store.clone());
        let record = StockRecord::register(ProductId::new(), "SKU", 3, StockThresholds::default(), Utc::now()).unwrap();

        assert!(!trail.record(AuditLogEntry::initial(&record, UserId::new(), Utc::now())));

        store.set_offline(false);
        assert!(trail.record(AuditLogEntry::initial(&record, UserId::new(), Utc::now())));
        assert_eq!(trail.history(record.product_id).unwrap().len(), 1);
    }

    #[test]
    fn history_is_ordered_by_version() {
        let trail = AuditTrail::new(Arc::new(InMemoryAuditStore::new()));
        let now = Utc::now();
        let v1 = StockRecord::register(ProductId::new(), "SKU", 10, StockThresholds::default(), now).unwrap();
        let v2 = v1.with_delta(0, 4, now).unwrap();
        let v3 = v2.with_delta(-4, -4, now).unwrap();
        let actor = UserId::new();

        trail.record(AuditLogEntry::transition(OperationType::Fulfillment, 4, &v2, &v3, actor, now));
        trail.record(AuditLogEntry::initial(&v1, actor, now));
        trail.record(AuditLogEntry::transition(OperationType::Reservation, 4, &v1, &v2, actor, now));

        let versions: Vec<u64> = trail
            .history(v1.product_id)
            .unwrap()
            .iter()
            .map(|e| e.version_after)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }
}
