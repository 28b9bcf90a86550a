//! Manual stock corrections with a pending → approved/rejected workflow.
//!
//! Submitting never touches the ledger. Approval claims the adjustment
//! (pending → approved, by CAS) before applying the signed delta, so a
//! concurrent second approval sees `AlreadyDecided` and stock moves once.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use stockledger_core::{AdjustmentId, DomainError, DomainResult, UserId, Versioned};
use stockledger_inventory::{
    AuditLogEntry, Decision, InventoryAdjustment, InventoryEvent, NewAdjustment, OperationType,
};

use crate::alerts::ReorderAlertEngine;
use crate::audit_trail::AuditTrail;
use crate::bulk::{BulkResult, run_bulk};
use crate::ledger::StockLedger;
use crate::notify::Notifier;
use crate::query::{AdjustmentQuery, Page};
use crate::retry::with_retry;
use crate::store::AdjustmentStore;

/// One entry of a bulk decision request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub adjustment_id: AdjustmentId,
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct AdjustmentWorkflow {
    ledger: Arc<StockLedger>,
    adjustments: Arc<dyn AdjustmentStore>,
    alerts: Arc<ReorderAlertEngine>,
    audit: AuditTrail,
    notifier: Notifier,
    require_distinct_approver: bool,
    bulk_item_timeout: Duration,
}

impl AdjustmentWorkflow {
    pub fn new(
        ledger: Arc<StockLedger>,
        adjustments: Arc<dyn AdjustmentStore>,
        alerts: Arc<ReorderAlertEngine>,
        audit: AuditTrail,
        notifier: Notifier,
    ) -> Self {
        Self {
            ledger,
            adjustments,
            alerts,
            audit,
            notifier,
            require_distinct_approver: true,
            bulk_item_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_distinct_approver(mut self, required: bool) -> Self {
        self.require_distinct_approver = required;
        self
    }

    pub fn with_bulk_item_timeout(mut self, timeout: Duration) -> Self {
        self.bulk_item_timeout = timeout;
        self
    }

    /// Record a pending correction against the product's current physical stock.
    pub fn submit(&self, request: NewAdjustment, requested_by: UserId) -> DomainResult<InventoryAdjustment> {
        let record = self.ledger.get_stock(request.product_id)?;
        let now = self.ledger.now();
        let adjustment = InventoryAdjustment::submit(request, record.physical_stock(), requested_by, now)?;
        self.adjustments.insert(adjustment.clone())?;

        info!(
            adjustment_id = %adjustment.id,
            product_id = %adjustment.product_id,
            kind = adjustment.adjustment_type.as_str(),
            quantity = adjustment.quantity_adjusted,
            "adjustment submitted"
        );
        self.notifier.publish(
            InventoryEvent::AdjustmentSubmitted {
                product_id: adjustment.product_id,
                adjustment_id: adjustment.id,
                quantity_adjusted: adjustment.quantity_adjusted,
                requested_by,
                occurred_at: now,
            },
            record.version(),
        );
        Ok(adjustment)
    }

    /// Approve or reject a pending adjustment. Valid once.
    ///
    /// Approval applies the submitted signed delta to the physical stock as
    /// it is now; if that would leave physical below zero or below what is
    /// reserved, approval fails with `NegativeStockRejected` and the
    /// adjustment stays pending.
    pub fn decide(
        &self,
        adjustment_id: AdjustmentId,
        decision: Decision,
        approver: UserId,
        notes: Option<String>,
    ) -> DomainResult<InventoryAdjustment> {
        let now = self.ledger.now();
        let (pending, decided) = with_retry(self.ledger.retry_policy(), "adjustment.decide", || {
            let current = self.get(adjustment_id)?;
            if current.is_pending() && self.require_distinct_approver && current.requested_by == approver {
                return Err(DomainError::Unauthorized);
            }
            let next = current.decide(decision, approver, notes.clone(), now)?;
            self.adjustments.compare_and_swap(current.version(), next.clone())?;
            Ok((current, next))
        })?;

        let result = match decision {
            Decision::Rejected => decided,
            Decision::Approved => self.apply_approved(&pending, decided, approver)?,
        };

        info!(
            adjustment_id = %adjustment_id,
            product_id = %result.product_id,
            decision = result.approval_status.as_str(),
            approver = %approver,
            "adjustment decided"
        );
        self.notifier.publish(
            InventoryEvent::AdjustmentDecided {
                product_id: result.product_id,
                adjustment_id,
                decision,
                decided_by: approver,
                occurred_at: now,
            },
            result.version(),
        );
        if decision == Decision::Approved {
            self.alerts.evaluate_after_change(result.product_id);
        }
        Ok(result)
    }

    fn apply_approved(
        &self,
        pending: &InventoryAdjustment,
        decided: InventoryAdjustment,
        approver: UserId,
    ) -> DomainResult<InventoryAdjustment> {
        let delta = decided.quantity_adjusted;
        let applied = self
            .ledger
            .update_with_retry(decided.product_id, "adjustment.apply", |record| {
                let resulting = record
                    .physical_stock()
                    .checked_add(delta)
                    .ok_or_else(|| DomainError::validation("quantity_adjusted out of range"))?;
                if resulting < 0 || resulting < record.reserved_stock() {
                    return Err(DomainError::negative_stock(record.physical_stock(), delta));
                }
                Ok((delta, 0))
            });

        let update = match applied {
            Ok(update) => update,
            Err(e) => {
                warn!(adjustment_id = %decided.id, error = %e, "approval not applied, adjustment back to pending");
                let restored = InventoryAdjustment {
                    version: decided.version() + 1,
                    ..pending.clone()
                };
                if let Err(restore_err) = self.adjustments.compare_and_swap(decided.version(), restored) {
                    error!(adjustment_id = %decided.id, error = %restore_err, "could not return adjustment to pending");
                }
                return Err(e);
            }
        };

        let final_record =
            decided.with_applied_stock(update.before.physical_stock(), update.after.physical_stock());
        if final_record.applied_off_snapshot() {
            info!(
                adjustment_id = %decided.id,
                submitted_physical = decided.previous_physical_stock,
                applied_physical = update.before.physical_stock(),
                "stock moved while adjustment was pending"
            );
        }
        let final_record = match self
            .adjustments
            .compare_and_swap(decided.version(), final_record.clone())
        {
            Ok(()) => final_record,
            Err(e) => {
                warn!(adjustment_id = %decided.id, error = %e, "could not refresh applied stock on adjustment");
                decided
            }
        };

        let kind = final_record.adjustment_type.as_str();
        let notes = match &final_record.decision_notes {
            Some(n) => format!("{kind}: {} ({n})", final_record.reason_code),
            None => format!("{kind}: {}", final_record.reason_code),
        };
        let entry = AuditLogEntry::transition(
            OperationType::InventoryAdjustment,
            delta,
            &update.before,
            &update.after,
            approver,
            self.ledger.now(),
        )
        .with_adjustment(final_record.id)
        .with_notes(notes);
        self.audit.record(entry);
        Ok(final_record)
    }

    /// Submit each request independently.
    pub fn bulk_submit(
        self: &Arc<Self>,
        requests: Vec<NewAdjustment>,
        requested_by: UserId,
    ) -> BulkResult<InventoryAdjustment> {
        let items = requests
            .into_iter()
            .map(|r| (r.product_id.to_string(), r))
            .collect();
        let workflow = Arc::clone(self);
        run_bulk("adjustment_submit", items, self.bulk_item_timeout, move |request| {
            workflow.submit(request, requested_by)
        })
    }

    /// Decide each adjustment independently.
    pub fn bulk_decide(
        self: &Arc<Self>,
        decisions: Vec<DecisionRequest>,
        approver: UserId,
    ) -> BulkResult<InventoryAdjustment> {
        let items = decisions
            .into_iter()
            .map(|d| (d.adjustment_id.to_string(), d))
            .collect();
        let workflow = Arc::clone(self);
        run_bulk("adjustment_decide", items, self.bulk_item_timeout, move |d| {
            workflow.decide(d.adjustment_id, d.decision, approver, d.notes)
        })
    }

    pub fn get(&self, adjustment_id: AdjustmentId) -> DomainResult<InventoryAdjustment> {
        self.adjustments
            .get(adjustment_id)?
            .ok_or_else(|| DomainError::not_found("adjustment", adjustment_id))
    }

    pub fn list(&self, query: &AdjustmentQuery) -> DomainResult<Page<InventoryAdjustment>> {
        Ok(query.run(self.adjustments.list()?))
    }
}
