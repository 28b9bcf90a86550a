//! Wiring of the stock services over one set of stores.

use std::sync::Arc;

use tracing::info;

use stockledger_core::{Clock, DomainResult, ProductId, SystemClock, UserId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{StockRecord, StockThresholds};

use crate::adjustments::AdjustmentWorkflow;
use crate::alerts::ReorderAlertEngine;
use crate::audit_trail::AuditTrail;
use crate::config::InventoryConfig;
use crate::ledger::StockLedger;
use crate::maintenance::MaintenanceScheduler;
use crate::notify::Notifier;
use crate::reconciler::ConsistencyReconciler;
use crate::reservations::ReservationManager;
use crate::store::{
    AdjustmentStore, AlertStore, AuditStore, Catalog, InMemoryAdjustmentStore, InMemoryAlertStore, InMemoryAuditStore,
    InMemoryCatalog, InMemoryReservationStore, InMemoryStockStore, ReservationStore, StockStore,
};

/// The five stock stores plus the catalog collaborator.
#[derive(Clone)]
pub struct Stores {
    pub stock: Arc<dyn StockStore>,
    pub reservations: Arc<dyn ReservationStore>,
    pub adjustments: Arc<dyn AdjustmentStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub audit: Arc<dyn AuditStore>,
    pub catalog: Arc<dyn Catalog>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self::in_memory_with_catalog(Arc::new(InMemoryCatalog::new()))
    }

    pub fn in_memory_with_catalog(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            stock: Arc::new(InMemoryStockStore::new()),
            reservations: Arc::new(InMemoryReservationStore::new()),
            adjustments: Arc::new(InMemoryAdjustmentStore::new()),
            alerts: Arc::new(InMemoryAlertStore::new()),
            audit: Arc::new(InMemoryAuditStore::new()),
            catalog,
        }
    }
}

/// Every stock service, sharing one ledger.
#[derive(Clone)]
pub struct InventoryEngine {
    pub ledger: Arc<StockLedger>,
    pub audit: AuditTrail,
    pub reservations: Arc<ReservationManager>,
    pub adjustments: Arc<AdjustmentWorkflow>,
    pub alerts: Arc<ReorderAlertEngine>,
    pub reconciler: Arc<ConsistencyReconciler>,
    config: InventoryConfig,
    clock: Arc<dyn Clock>,
}

impl InventoryEngine {
    pub fn new(stores: Stores, config: InventoryConfig, clock: Arc<dyn Clock>, notifier: Notifier) -> Self {
        let audit = AuditTrail::new(stores.audit);
        let ledger = Arc::new(StockLedger::new(
            stores.stock,
            audit.clone(),
            notifier.clone(),
            clock.clone(),
            config.retry.clone(),
        ));
        let alerts = Arc::new(ReorderAlertEngine::new(
            ledger.clone(),
            stores.alerts,
            notifier.clone(),
        ));
        let reservations = Arc::new(ReservationManager::new(
            ledger.clone(),
            stores.reservations.clone(),
            alerts.clone(),
            audit.clone(),
            notifier.clone(),
            config.clone(),
        ));
        let adjustments = Arc::new(
            AdjustmentWorkflow::new(ledger.clone(), stores.adjustments, alerts.clone(), audit.clone(), notifier)
                .with_distinct_approver(config.require_distinct_approver)
                .with_bulk_item_timeout(config.bulk_item_timeout),
        );
        let reconciler = Arc::new(ConsistencyReconciler::new(
            ledger.clone(),
            stores.reservations,
            stores.catalog,
        ));

        info!(
            retry_attempts = config.retry.attempts(),
            reservation_ttl_secs = config.reservation_ttl.as_secs(),
            duplicate_reservation = ?config.duplicate_reservation,
            "inventory engine ready"
        );

        Self {
            ledger,
            audit,
            reservations,
            adjustments,
            alerts,
            reconciler,
            config,
            clock,
        }
    }

    /// In-memory stores, wall clock, no event consumer.
    pub fn in_memory(config: InventoryConfig) -> Self {
        Self::new(Stores::in_memory(), config, Arc::new(SystemClock), Notifier::default())
    }

    /// In-memory stores publishing on `bus`.
    pub fn in_memory_with_bus<B>(config: InventoryConfig, clock: Arc<dyn Clock>, bus: B) -> Self
    where
        B: EventBus<EventEnvelope<serde_json::Value>> + 'static,
    {
        Self::new(Stores::in_memory(), config, clock, Notifier::new(bus))
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Register a product and run a first reorder evaluation.
    pub fn register_product(
        &self,
        product_id: ProductId,
        sku: impl Into<String>,
        initial_physical: i64,
        thresholds: StockThresholds,
        actor: UserId,
    ) -> DomainResult<StockRecord> {
        let record = self
            .ledger
            .register_product(product_id, sku, initial_physical, thresholds, actor)?;
        self.alerts.evaluate_after_change(product_id);
        Ok(record)
    }

    /// Replace thresholds and re-evaluate alerts against them.
    pub fn configure_thresholds(
        &self,
        product_id: ProductId,
        thresholds: StockThresholds,
        actor: UserId,
    ) -> DomainResult<StockRecord> {
        let update = self.ledger.configure_thresholds(product_id, thresholds, actor)?;
        self.alerts.evaluate_after_change(product_id);
        Ok(update.after)
    }

    /// Background expiry sweep and reorder scan on the configured intervals.
    pub fn maintenance_scheduler(&self) -> MaintenanceScheduler {
        MaintenanceScheduler::new(self.reservations.clone(), self.alerts.clone(), self.clock.clone())
            .with_expiry_interval(self.config.expiry_sweep_interval)
            .with_scan_interval(self.config.reorder_scan_interval)
    }
}
