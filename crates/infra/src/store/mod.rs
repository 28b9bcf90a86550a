//! Persistence boundary for the five logical stock stores plus the catalog
//! collaborator.
//!
//! Every mutable store offers a compare-and-swap write keyed on the record's
//! `version`; there is no other way to overwrite a record. The audit store is
//! append-only.

pub mod in_memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::{AdjustmentId, AlertId, DomainError, OrderId, ProductId, ReservationId};
use stockledger_inventory::{AuditLogEntry, InventoryAdjustment, ReorderAlert, StockRecord, StockReservation};

pub use in_memory::{
    InMemoryAdjustmentStore, InMemoryAlertStore, InMemoryAuditStore, InMemoryCatalog, InMemoryReservationStore,
    InMemoryStockStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("version conflict (expected {expected}, found {actual:?})")]
    Conflict { expected: u64, actual: Option<u64> },

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { .. } => DomainError::concurrent_modification(value.to_string()),
            StoreError::Duplicate(msg) => DomainError::already_processed(msg),
            StoreError::NotFound(id) => DomainError::not_found("record", id),
            StoreError::Unavailable(msg) => DomainError::unavailable(msg),
        }
    }
}

/// Canonical stock records (one per product).
pub trait StockStore: Send + Sync {
    fn get(&self, product_id: ProductId) -> StoreResult<Option<StockRecord>>;
    fn list(&self) -> StoreResult<Vec<StockRecord>>;
    /// Insert a new record; `Duplicate` if the product already has one.
    fn insert(&self, record: StockRecord) -> StoreResult<()>;
    /// Replace the record only if its stored version equals `expected_version`.
    fn compare_and_swap(&self, expected_version: u64, record: StockRecord) -> StoreResult<()>;
}

pub trait ReservationStore: Send + Sync {
    fn get(&self, id: ReservationId) -> StoreResult<Option<StockReservation>>;
    fn find_active(&self, product_id: ProductId, order_id: OrderId) -> StoreResult<Option<StockReservation>>;
    /// Every reservation (any status) for the pair, oldest first.
    fn for_order(&self, product_id: ProductId, order_id: OrderId) -> StoreResult<Vec<StockReservation>>;
    /// Insert an active reservation; `Duplicate` if the pair already has one.
    fn insert_active(&self, reservation: StockReservation) -> StoreResult<()>;
    fn compare_and_swap(&self, expected_version: u64, reservation: StockReservation) -> StoreResult<()>;
    fn due_for_expiry(&self, now: DateTime<Utc>) -> StoreResult<Vec<StockReservation>>;
    fn list(&self) -> StoreResult<Vec<StockReservation>>;
}

pub trait AdjustmentStore: Send + Sync {
    fn get(&self, id: AdjustmentId) -> StoreResult<Option<InventoryAdjustment>>;
    fn insert(&self, adjustment: InventoryAdjustment) -> StoreResult<()>;
    fn compare_and_swap(&self, expected_version: u64, adjustment: InventoryAdjustment) -> StoreResult<()>;
    fn list(&self) -> StoreResult<Vec<InventoryAdjustment>>;
}

pub trait AlertStore: Send + Sync {
    fn get(&self, id: AlertId) -> StoreResult<Option<ReorderAlert>>;
    /// The open or acknowledged alert for a product, if any.
    fn active_for_product(&self, product_id: ProductId) -> StoreResult<Option<ReorderAlert>>;
    /// Insert an active alert; `Duplicate` if the product already has one.
    fn insert_active(&self, alert: ReorderAlert) -> StoreResult<()>;
    fn compare_and_swap(&self, expected_version: u64, alert: ReorderAlert) -> StoreResult<()>;
    fn list(&self) -> StoreResult<Vec<ReorderAlert>>;
}

/// Append-only audit log.
pub trait AuditStore: Send + Sync {
    fn append(&self, entry: AuditLogEntry) -> StoreResult<()>;
    fn list(&self) -> StoreResult<Vec<AuditLogEntry>>;
}

/// Product data owned by the catalog, including the legacy stock field the
/// ledger replaced. Money is in the smallest currency unit (e.g. cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub legacy_stock_quantity: Option<i64>,
    pub unit_cost: Option<u64>,
    pub unit_price: Option<u64>,
}

/// Read-only view of the catalog collaborator.
pub trait Catalog: Send + Sync {
    fn get(&self, product_id: ProductId) -> StoreResult<Option<CatalogProduct>>;
    fn list(&self) -> StoreResult<Vec<CatalogProduct>>;
}

macro_rules! forward_arc {
    ($trait:ident { $(fn $name:ident(&self $(, $arg:ident : $ty:ty)*) -> $ret:ty;)* }) => {
        impl<S> $trait for std::sync::Arc<S>
        where
            S: $trait + ?Sized,
        {
            $(fn $name(&self $(, $arg: $ty)*) -> $ret {
                (**self).$name($($arg),*)
            })*
        }
    };
}

forward_arc!(StockStore {
    fn get(&self, product_id: ProductId) -> StoreResult<Option<StockRecord>>;
    fn list(&self) -> StoreResult<Vec<StockRecord>>;
    fn insert(&self, record: StockRecord) -> StoreResult<()>;
    fn compare_and_swap(&self, expected_version: u64, record: StockRecord) -> StoreResult<()>;
});

forward_arc!(ReservationStore {
    fn get(&self, id: ReservationId) -> StoreResult<Option<StockReservation>>;
    fn find_active(&self, product_id: ProductId, order_id: OrderId) -> StoreResult<Option<StockReservation>>;
    fn for_order(&self, product_id: ProductId, order_id: OrderId) -> StoreResult<Vec<StockReservation>>;
    fn insert_active(&self, reservation: StockReservation) -> StoreResult<()>;
    fn compare_and_swap(&self, expected_version: u64, reservation: StockReservation) -> StoreResult<()>;
    fn due_for_expiry(&self, now: DateTime<Utc>) -> StoreResult<Vec<StockReservation>>;
    fn list(&self) -> StoreResult<Vec<StockReservation>>;
});

forward_arc!(AdjustmentStore {
    fn get(&self, id: AdjustmentId) -> StoreResult<Option<InventoryAdjustment>>;
    fn insert(&self, adjustment: InventoryAdjustment) -> StoreResult<()>;
    fn compare_and_swap(&self, expected_version: u64, adjustment: InventoryAdjustment) -> StoreResult<()>;
    fn list(&self) -> StoreResult<Vec<InventoryAdjustment>>;
});

forward_arc!(AlertStore {
    fn get(&self, id: AlertId) -> StoreResult<Option<ReorderAlert>>;
    fn active_for_product(&self, product_id: ProductId) -> StoreResult<Option<ReorderAlert>>;
    fn insert_active(&self, alert: ReorderAlert) -> StoreResult<()>;
    fn compare_and_swap(&self, expected_version: u64, alert: ReorderAlert) -> StoreResult<()>;
    fn list(&self) -> StoreResult<Vec<ReorderAlert>>;
});

forward_arc!(AuditStore {
    fn append(&self, entry: AuditLogEntry) -> StoreResult<()>;
    fn list(&self) -> StoreResult<Vec<AuditLogEntry>>;
});

forward_arc!(Catalog {
    fn get(&self, product_id: ProductId) -> StoreResult<Option<CatalogProduct>>;
    fn list(&self) -> StoreResult<Vec<CatalogProduct>>;
});
