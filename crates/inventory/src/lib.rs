//! Inventory stock domain.
//!
//! Business rules for the stock ledger, implemented purely as deterministic
//! domain logic (no IO, no storage, no clocks). Every state change is a pure
//! function returning the next value; infrastructure decides how that value
//! is persisted.

pub mod adjustment;
pub mod alert;
pub mod audit;
pub mod events;
pub mod reservation;
pub mod stock;

pub use adjustment::{
    AdjustmentType, ApprovalStatus, Decision, InventoryAdjustment, NewAdjustment, SignRule,
};
pub use alert::{AlertAction, AlertStatus, AlertType, ReorderAlert, plan_evaluation};
pub use audit::{AuditLogEntry, OperationType, StockSnapshot};
pub use events::{InventoryEvent, ReleaseReason};
pub use reservation::{ReservationStatus, StockReservation};
pub use stock::{
    StockHold, StockLevels, StockLevelsError, StockRecord, StockStatus, StockThresholds, classify,
};
