use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use stockledger_core::{AdjustmentId, AlertId, OrderId, ProductId, ReservationId, Versioned};
use stockledger_inventory::{AuditLogEntry, InventoryAdjustment, ReorderAlert, StockRecord, StockReservation};

use super::{
    AdjustmentStore, AlertStore, AuditStore, Catalog, CatalogProduct, ReservationStore, StockStore, StoreError,
    StoreResult,
};

/// Lock-guarded map with an availability switch.
///
/// An unprovisioned table answers every call with `StoreError::Unavailable`,
/// which is how tests exercise the "dependency down" paths.
#[derive(Debug)]
struct Table<K, V> {
    name: &'static str,
    rows: RwLock<HashMap<K, V>>,
    offline: AtomicBool,
}

impl<K, V> Table<K, V>
where
    K: Copy + Eq + Hash + std::fmt::Display,
    V: Clone + Versioned,
{
    fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("{} store is not provisioned", self.name)))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<K, V>>> {
        self.ensure_online()?;
        self.rows
            .read()
            .map_err(|_| StoreError::Unavailable(format!("{} store lock poisoned", self.name)))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<K, V>>> {
        self.ensure_online()?;
        self.rows
            .write()
            .map_err(|_| StoreError::Unavailable(format!("{} store lock poisoned", self.name)))
    }

    fn get(&self, key: K) -> StoreResult<Option<V>> {
        Ok(self.read()?.get(&key).cloned())
    }

    fn find(&self, pred: impl Fn(&V) -> bool) -> StoreResult<Vec<V>> {
        Ok(self.read()?.values().filter(|v| pred(v)).cloned().collect())
    }

    /// Insert unless the key exists or any stored row clashes with `value`.
    /// The clash check and the insert happen under one write lock.
    fn insert_unique(&self, key: K, value: V, clashes: impl Fn(&V) -> bool) -> StoreResult<()> {
        let mut rows = self.write()?;
        if rows.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("{} {key}", self.name)));
        }
        if rows.values().any(|existing| clashes(existing)) {
            return Err(StoreError::Duplicate(format!("{} {key} clashes with an active row", self.name)));
        }
        rows.insert(key, value);
        Ok(())
    }

    fn compare_and_swap(&self, key: K, expected_version: u64, value: V) -> StoreResult<()> {
        let mut rows = self.write()?;
        let actual = rows.get(&key).map(Versioned::version);
        match actual {
            None => Err(StoreError::NotFound(format!("{} {key}", self.name))),
            Some(v) if v != expected_version => Err(StoreError::Conflict {
                expected: expected_version,
                actual,
            }),
            Some(_) => {
                rows.insert(key, value);
                Ok(())
            }
        }
    }
}

macro_rules! offline_switch {
    ($store:ident) => {
        impl $store {
            pub fn new() -> Self {
                Self::default()
            }

            /// A store whose every call fails with `Unavailable`.
            pub fn unprovisioned() -> Self {
                let store = Self::default();
                store.set_offline(true);
                store
            }

            pub fn set_offline(&self, offline: bool) {
                self.table.set_offline(offline);
            }
        }
    };
}

#[derive(Debug)]
pub struct InMemoryStockStore {
    table: Table<ProductId, StockRecord>,
}

impl Default for InMemoryStockStore {
    fn default() -> Self {
        Self {
            table: Table::new("stock"),
        }
    }
}

offline_switch!(InMemoryStockStore);

impl StockStore for InMemoryStockStore {
    fn get(&self, product_id: ProductId) -> StoreResult<Option<StockRecord>> {
        self.table.get(product_id)
    }

    fn list(&self) -> StoreResult<Vec<StockRecord>> {
        self.table.find(|_| true)
    }

    fn insert(&self, record: StockRecord) -> StoreResult<()> {
        self.table.insert_unique(record.product_id, record, |_| false)
    }

    fn compare_and_swap(&self, expected_version: u64, record: StockRecord) -> StoreResult<()> {
        self.table.compare_and_swap(record.product_id, expected_version, record)
    }
}

#[derive(Debug)]
pub struct InMemoryReservationStore {
    table: Table<ReservationId, StockReservation>,
}

impl Default for InMemoryReservationStore {
    fn default() -> Self {
        Self {
            table: Table::new("reservation"),
        }
    }
}

offline_switch!(InMemoryReservationStore);

impl ReservationStore for InMemoryReservationStore {
    fn get(&self, id: ReservationId) -> StoreResult<Option<StockReservation>> {
        self.table.get(id)
    }

    fn find_active(&self, product_id: ProductId, order_id: OrderId) -> StoreResult<Option<StockReservation>> {
        Ok(self
            .table
            .find(|r| r.is_active() && r.product_id == product_id && r.order_id == order_id)?
            .into_iter()
            .next())
    }

    fn for_order(&self, product_id: ProductId, order_id: OrderId) -> StoreResult<Vec<StockReservation>> {
        let mut rows = self
            .table
            .find(|r| r.product_id == product_id && r.order_id == order_id)?;
        rows.sort_by_key(|r| (r.reserved_at, r.id));
        Ok(rows)
    }

    fn insert_active(&self, reservation: StockReservation) -> StoreResult<()> {
        let (product_id, order_id) = (reservation.product_id, reservation.order_id);
        self.table.insert_unique(reservation.id, reservation, |existing| {
            existing.is_active() && existing.product_id == product_id && existing.order_id == order_id
        })
    }

    fn compare_and_swap(&self, expected_version: u64, reservation: StockReservation) -> StoreResult<()> {
        self.table
            .compare_and_swap(reservation.id, expected_version, reservation)
    }

    fn due_for_expiry(&self, now: DateTime<Utc>) -> StoreResult<Vec<StockReservation>> {
        let mut rows = self.table.find(|r| r.is_due_for_expiry(now))?;
        rows.sort_by_key(|r| r.expires_at);
        Ok(rows)
    }

    fn list(&self) -> StoreResult<Vec<StockReservation>> {
        self.table.find(|_| true)
    }
}

#[derive(Debug)]
pub struct InMemoryAdjustmentStore {
    table: Table<AdjustmentId, InventoryAdjustment>,
}

impl Default for InMemoryAdjustmentStore {
    fn default() -> Self {
        Self {
            table: Table::new("adjustment"),
        }
    }
}

offline_switch!(InMemoryAdjustmentStore);

impl AdjustmentStore for InMemoryAdjustmentStore {
    fn get(&self, id: AdjustmentId) -> StoreResult<Option<InventoryAdjustment>> {
        self.table.get(id)
    }

    fn insert(&self, adjustment: InventoryAdjustment) -> StoreResult<()> {
        self.table.insert_unique(adjustment.id, adjustment, |_| false)
    }

    fn compare_and_swap(&self, expected_version: u64, adjustment: InventoryAdjustment) -> StoreResult<()> {
        self.table
            .compare_and_swap(adjustment.id, expected_version, adjustment)
    }

    fn list(&self) -> StoreResult<Vec<InventoryAdjustment>> {
        self.table.find(|_| true)
    }
}

#[derive(Debug)]
pub struct InMemoryAlertStore {
    table: Table<AlertId, ReorderAlert>,
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self {
            table: Table::new("alert"),
        }
    }
}

offline_switch!(InMemoryAlertStore);

impl AlertStore for InMemoryAlertStore {
    fn get(&self, id: AlertId) -> StoreResult<Option<ReorderAlert>> {
        self.table.get(id)
    }

    fn active_for_product(&self, product_id: ProductId) -> StoreResult<Option<ReorderAlert>> {
        Ok(self
            .table
            .find(|a| a.alert_status.is_active() && a.product_id == product_id)?
            .into_iter()
            .next())
    }

    fn insert_active(&self, alert: ReorderAlert) -> StoreResult<()> {
        let product_id = alert.product_id;
        self.table.insert_unique(alert.id, alert, |existing| {
            existing.alert_status.is_active() && existing.product_id == product_id
        })
    }

    fn compare_and_swap(&self, expected_version: u64, alert: ReorderAlert) -> StoreResult<()> {
        self.table.compare_and_swap(alert.id, expected_version, alert)
    }

    fn list(&self) -> StoreResult<Vec<ReorderAlert>> {
        self.table.find(|_| true)
    }
}

/// In-memory append-only audit log.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditLogEntry>>,
    offline: AtomicBool,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unprovisioned() -> Self {
        let store = Self::default();
        store.set_offline(true);
        store
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("audit store is not provisioned".to_string()))
        } else {
            Ok(())
        }
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(&self, entry: AuditLogEntry) -> StoreResult<()> {
        self.ensure_online()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Unavailable("audit store lock poisoned".to_string()))?;
        entries.push(entry);
        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<AuditLogEntry>> {
        self.ensure_online()?;
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::Unavailable("audit store lock poisoned".to_string()))?;
        Ok(entries.clone())
    }
}

/// Catalog double seeded by tests and the API binary.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, CatalogProduct>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, product: CatalogProduct) -> StoreResult<()> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::Unavailable("catalog lock poisoned".to_string()))?;
        products.insert(product.product_id, product);
        Ok(())
    }
}

impl Catalog for InMemoryCatalog {
    fn get(&self, product_id: ProductId) -> StoreResult<Option<CatalogProduct>> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::Unavailable("catalog lock poisoned".to_string()))?;
        Ok(products.get(&product_id).cloned())
    }

    fn list(&self) -> StoreResult<Vec<CatalogProduct>> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::Unavailable("catalog lock poisoned".to_string()))?;
        Ok(products.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stockledger_inventory::StockThresholds;

    fn record() -> StockRecord {
        StockRecord::register(ProductId::new(), "SKU-1", 10, StockThresholds::default(), Utc::now()).unwrap()
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let store = InMemoryStockStore::new();
        let r = record();
        store.insert(r.clone()).unwrap();

        let next = r.with_delta(0, 2, Utc::now()).unwrap();
        store.compare_and_swap(1, next.clone()).unwrap();

        let stale = r.with_delta(-1, 0, Utc::now()).unwrap();
        let err = store.compare_and_swap(1, stale).unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                expected: 1,
                actual: Some(2)
            }
        );
        assert_eq!(store.get(r.product_id).unwrap(), Some(next));
    }

    #[test]
    fn second_active_reservation_for_pair_is_duplicate() {
        let store = InMemoryReservationStore::new();
        let now = Utc::now();
        let (product, order) = (ProductId::new(), OrderId::new());
        let first = StockReservation::open(product, order, 2, now, now + Duration::minutes(5)).unwrap();
        store.insert_active(first.clone()).unwrap();

        let second = StockReservation::open(product, order, 1, now, now + Duration::minutes(5)).unwrap();
        assert!(matches!(store.insert_active(second.clone()), Err(StoreError::Duplicate(_))));

        store
            .compare_and_swap(1, first.cancel(now).unwrap())
            .unwrap();
        store.insert_active(second).unwrap();
        assert_eq!(store.for_order(product, order).unwrap().len(), 2);
    }

    #[test]
    fn unprovisioned_store_reports_unavailable() {
        let store = InMemoryStockStore::unprovisioned();
        assert!(matches!(store.list(), Err(StoreError::Unavailable(_))));

        store.set_offline(false);
        assert!(store.list().unwrap().is_empty());
    }
}
