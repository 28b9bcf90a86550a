//! Domain events published after committed stock mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AdjustmentId, AlertId, OrderId, ProductId, ReservationId, UserId};
use stockledger_events::Event;

use crate::adjustment::Decision;
use crate::alert::{AlertStatus, AlertType};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InventoryEvent {
    StockRegistered {
        product_id: ProductId,
        sku: String,
        physical_stock: i64,
        occurred_at: DateTime<Utc>,
    },
    StockReserved {
        product_id: ProductId,
        order_id: OrderId,
        reservation_id: ReservationId,
        quantity: i64,
        available_after: i64,
        occurred_at: DateTime<Utc>,
    },
    ReservationFulfilled {
        product_id: ProductId,
        order_id: OrderId,
        reservation_id: ReservationId,
        quantity: i64,
        fully_fulfilled: bool,
        occurred_at: DateTime<Utc>,
    },
    ReservationReleased {
        product_id: ProductId,
        order_id: OrderId,
        reservation_id: ReservationId,
        quantity: i64,
        reason: ReleaseReason,
        occurred_at: DateTime<Utc>,
    },
    StockReturned {
        product_id: ProductId,
        order_id: OrderId,
        quantity: i64,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    AdjustmentSubmitted {
        product_id: ProductId,
        adjustment_id: AdjustmentId,
        quantity_adjusted: i64,
        requested_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    AdjustmentDecided {
        product_id: ProductId,
        adjustment_id: AdjustmentId,
        decision: Decision,
        decided_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    ReorderAlertRaised {
        product_id: ProductId,
        alert_id: AlertId,
        alert_type: AlertType,
        current_stock: i64,
        suggested_reorder_quantity: i64,
        occurred_at: DateTime<Utc>,
    },
    ReorderAlertEscalated {
        product_id: ProductId,
        alert_id: AlertId,
        from: AlertType,
        to: AlertType,
        current_stock: i64,
        occurred_at: DateTime<Utc>,
    },
    ReorderAlertStatusChanged {
        product_id: ProductId,
        alert_id: AlertId,
        status: AlertStatus,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockRegistered { .. } => "inventory.stock.registered",
            InventoryEvent::StockReserved { .. } => "inventory.reservation.created",
            InventoryEvent::ReservationFulfilled { .. } => "inventory.reservation.fulfilled",
            InventoryEvent::ReservationReleased { .. } => "inventory.reservation.released",
            InventoryEvent::StockReturned { .. } => "inventory.stock.returned",
            InventoryEvent::AdjustmentSubmitted { .. } => "inventory.adjustment.submitted",
            InventoryEvent::AdjustmentDecided { .. } => "inventory.adjustment.decided",
            InventoryEvent::ReorderAlertRaised { .. } => "inventory.alert.raised",
            InventoryEvent::ReorderAlertEscalated { .. } => "inventory.alert.escalated",
            InventoryEvent::ReorderAlertStatusChanged { .. } => "inventory.alert.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockRegistered { occurred_at, .. }
            | InventoryEvent::StockReserved { occurred_at, .. }
            | InventoryEvent::ReservationFulfilled { occurred_at, .. }
            | InventoryEvent::ReservationReleased { occurred_at, .. }
            | InventoryEvent::StockReturned { occurred_at, .. }
            | InventoryEvent::AdjustmentSubmitted { occurred_at, .. }
            | InventoryEvent::AdjustmentDecided { occurred_at, .. }
            | InventoryEvent::ReorderAlertRaised { occurred_at, .. }
            | InventoryEvent::ReorderAlertEscalated { occurred_at, .. }
            | InventoryEvent::ReorderAlertStatusChanged { occurred_at, .. } => *occurred_at,
        }
    }

    fn product_id(&self) -> ProductId {
        match self {
            InventoryEvent::StockRegistered { product_id, .. }
            | InventoryEvent::StockReserved { product_id, .. }
            | InventoryEvent::ReservationFulfilled { product_id, .. }
            | InventoryEvent::ReservationReleased { product_id, .. }
            | InventoryEvent::StockReturned { product_id, .. }
            | InventoryEvent::AdjustmentSubmitted { product_id, .. }
            | InventoryEvent::AdjustmentDecided { product_id, .. }
            | InventoryEvent::ReorderAlertRaised { product_id, .. }
            | InventoryEvent::ReorderAlertEscalated { product_id, .. }
            | InventoryEvent::ReorderAlertStatusChanged { product_id, .. } => *product_id,
        }
    }
}
