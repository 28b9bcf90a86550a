//! Infrastructure layer: stores, the stock ledger and the services built on it.

pub mod adjustments;
pub mod alerts;
pub mod audit_trail;
pub mod bulk;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod maintenance;
pub mod notify;
pub mod query;
pub mod reconciler;
pub mod reservations;
pub mod retry;
pub mod store;


pub use adjustments::{AdjustmentWorkflow, DecisionRequest};
pub use alerts::{Evaluation, EvaluationOutcome, ReorderAlertEngine, ScanReport};
pub use audit_trail::AuditTrail;
pub use bulk::{BulkFailure, BulkResult};
pub use config::{BackoffStrategy, DuplicateReservationPolicy, InventoryConfig, RetryPolicy};
pub use engine::{InventoryEngine, Stores};
pub use ledger::{LedgerUpdate, StockLedger};
pub use maintenance::{MaintenanceHandle, MaintenanceScheduler, MaintenanceStats};
pub use notify::Notifier;
pub use reconciler::{
    ConsistencyReconciler, ConsistencyReport, InventoryValuation, ReservedDrift, StatusCounts, StockMismatch,
};
pub use reservations::{ReservationManager, ReservationReceipt, SweepReport};
