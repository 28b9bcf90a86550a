//! Immutable audit trail entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AdjustmentId, AuditEntryId, DomainError, DomainResult, OrderId, ProductId, ReservationId, UserId,
    Versioned,
};

use crate::stock::{StockLevels, StockRecord};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    InitialStock,
    Reservation,
    Fulfillment,
    ReservationCancelled,
    ReservationExpired,
    CustomerReturn,
    InventoryAdjustment,
    ThresholdUpdate,
    HoldPlaced,
    HoldReleased,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::InitialStock => "initial_stock",
            OperationType::Reservation => "reservation",
            OperationType::Fulfillment => "fulfillment",
            OperationType::ReservationCancelled => "reservation_cancelled",
            OperationType::ReservationExpired => "reservation_expired",
            OperationType::CustomerReturn => "customer_return",
            OperationType::InventoryAdjustment => "inventory_adjustment",
            OperationType::ThresholdUpdate => "threshold_update",
            OperationType::HoldPlaced => "hold_placed",
            OperationType::HoldReleased => "hold_released",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        let all = [
            OperationType::InitialStock,
            OperationType::Reservation,
            OperationType::Fulfillment,
            OperationType::ReservationCancelled,
            OperationType::ReservationExpired,
            OperationType::CustomerReturn,
            OperationType::InventoryAdjustment,
            OperationType::ThresholdUpdate,
            OperationType::HoldPlaced,
            OperationType::HoldReleased,
        ];
        all.into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown operation type '{s}'")))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub physical: i64,
    pub reserved: i64,
    pub available: i64,
}

impl From<&StockLevels> for StockSnapshot {
    fn from(levels: &StockLevels) -> Self {
        Self {
            physical: levels.physical(),
            reserved: levels.reserved(),
            available: levels.available(),
        }
    }
}

/// One stock-affecting event with before/after snapshots.
///
/// Entries are append-only: there are no mutators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub product_id: ProductId,
    pub operation_type: OperationType,
    pub quantity_affected: i64,
    pub before: StockSnapshot,
    pub after: StockSnapshot,
    pub version_before: u64,
    pub version_after: u64,
    pub order_id: Option<OrderId>,
    pub reservation_id: Option<ReservationId>,
    pub adjustment_id: Option<AdjustmentId>,
    pub actor: UserId,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl AuditLogEntry {
    /// Entry describing the move from `before` to `after`.
    pub fn transition(
        operation_type: OperationType,
        quantity_affected: i64,
        before: &StockRecord,
        after: &StockRecord,
        actor: UserId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            product_id: after.product_id,
            operation_type,
            quantity_affected,
            before: before.levels().into(),
            after: after.levels().into(),
            version_before: before.version(),
            version_after: after.version(),
            order_id: None,
            reservation_id: None,
            adjustment_id: None,
            actor,
            recorded_at,
            notes: None,
        }
    }

    /// Entry for a freshly registered record (before = empty, version 0).
    pub fn initial(record: &StockRecord, actor: UserId, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: AuditEntryId::new(),
            product_id: record.product_id,
            operation_type: OperationType::InitialStock,
            quantity_affected: record.physical_stock(),
            before: (&StockLevels::empty()).into(),
            after: record.levels().into(),
            version_before: 0,
            version_after: record.version(),
            order_id: None,
            reservation_id: None,
            adjustment_id: None,
            actor,
            recorded_at,
            notes: None,
        }
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_reservation(mut self, reservation_id: ReservationId) -> Self {
        self.reservation_id = Some(reservation_id);
        self
    }

    pub fn with_adjustment(mut self, adjustment_id: AdjustmentId) -> Self {
        self.adjustment_id = Some(adjustment_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::StockThresholds;

    #[test]
    fn transition_captures_both_snapshots_and_versions() {
        let now = Utc::now();
        let before =
            StockRecord::register(ProductId::new(), "SKU", 20, StockThresholds::default(), now).unwrap();
        let after = before.with_delta(0, 8, now).unwrap();
        let order_id = OrderId::new();

        let entry = AuditLogEntry::transition(OperationType::Reservation, 8, &before, &after, UserId::new(), now)
            .with_order(order_id);

        assert_eq!(entry.before.available, 20);
        assert_eq!(entry.after.available, 12);
        assert_eq!(entry.after.reserved, 8);
        assert_eq!((entry.version_before, entry.version_after), (1, 2));
        assert_eq!(entry.order_id, Some(order_id));
    }

    #[test]
    fn operation_type_parse_matches_as_str() {
        assert_eq!(
            OperationType::parse("inventory_adjustment").unwrap(),
            OperationType::InventoryAdjustment
        );
        assert!(OperationType::parse("restock").is_err());
    }
}
