//! Reorder alert evaluation and lifecycle.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use stockledger_core::{AlertId, DomainError, DomainResult, ProductId, UserId, Versioned};
use stockledger_inventory::{
    AlertAction, AlertStatus, AlertType, InventoryEvent, ReorderAlert, StockRecord, plan_evaluation,
};

use crate::ledger::StockLedger;
use crate::notify::Notifier;
use crate::query::{AlertQuery, Page};
use crate::retry::with_retry;
use crate::store::{AlertStore, StoreError};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Unchanged,
    Raised,
    Escalated,
    AutoResolved,
}

/// Result of evaluating one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub product_id: ProductId,
    pub classification: Option<AlertType>,
    pub outcome: EvaluationOutcome,
    /// The product's active alert after evaluation (or the one just resolved).
    pub alert: Option<ReorderAlert>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub evaluated: usize,
    pub raised: usize,
    pub escalated: usize,
    pub resolved: usize,
    pub failed: Vec<(ProductId, String)>,
}

pub struct ReorderAlertEngine {
    ledger: Arc<StockLedger>,
    alerts: Arc<dyn AlertStore>,
    notifier: Notifier,
}

impl ReorderAlertEngine {
    pub fn new(ledger: Arc<StockLedger>, alerts: Arc<dyn AlertStore>, notifier: Notifier) -> Self {
        Self {
            ledger,
            alerts,
            notifier,
        }
    }

    /// Classify the product's current stock and open, escalate or close its
    /// alert accordingly. Re-running without a stock change is a no-op.
    pub fn evaluate(&self, product_id: ProductId) -> DomainResult<Evaluation> {
        with_retry(self.ledger.retry_policy(), "evaluate", || {
            let record = self.ledger.get_stock(product_id)?;
            let active = self.alerts.active_for_product(product_id)?;
            self.apply_plan(&record, active)
        })
    }

    /// Same as [`evaluate`](Self::evaluate) but only logs failures. Used after
    /// a stock change has already been committed.
    pub fn evaluate_after_change(&self, product_id: ProductId) {
        if let Err(e) = self.evaluate(product_id) {
            warn!(product_id = %product_id, error = %e, "reorder evaluation failed after stock change");
        }
    }

    fn apply_plan(&self, record: &StockRecord, active: Option<ReorderAlert>) -> DomainResult<Evaluation> {
        let now = self.ledger.now();
        let product_id = record.product_id;
        let classification = record.classification();

        let (outcome, alert, event) = match (plan_evaluation(record, active.as_ref()), active) {
            (AlertAction::Keep, active) => (EvaluationOutcome::Unchanged, active, None),
            (AlertAction::Raise(kind), _) => {
                let alert = ReorderAlert::raise(kind, record, now);
                self.alerts.insert_active(alert.clone()).map_err(|e| match e {
                    // Someone raised one concurrently; re-plan against it.
                    StoreError::Duplicate(msg) => DomainError::concurrent_modification(msg),
                    other => other.into(),
                })?;
                let event = InventoryEvent::ReorderAlertRaised {
                    product_id,
                    alert_id: alert.id,
                    alert_type: kind,
                    current_stock: alert.current_stock,
                    suggested_reorder_quantity: alert.suggested_reorder_quantity,
                    occurred_at: now,
                };
                (EvaluationOutcome::Raised, Some(alert), Some(event))
            }
            (AlertAction::Escalate(kind), Some(current)) => {
                let next = current.escalate(kind, record, now)?;
                self.alerts.compare_and_swap(current.version(), next.clone())?;
                let event = InventoryEvent::ReorderAlertEscalated {
                    product_id,
                    alert_id: next.id,
                    from: current.alert_type,
                    to: kind,
                    current_stock: next.current_stock,
                    occurred_at: now,
                };
                (EvaluationOutcome::Escalated, Some(next), Some(event))
            }
            (AlertAction::AutoResolve, Some(current)) => {
                let next = current.resolve(UserId::system(), false, now)?;
                self.alerts.compare_and_swap(current.version(), next.clone())?;
                let event = InventoryEvent::ReorderAlertStatusChanged {
                    product_id,
                    alert_id: next.id,
                    status: AlertStatus::Resolved,
                    actor: UserId::system(),
                    occurred_at: now,
                };
                (EvaluationOutcome::AutoResolved, Some(next), Some(event))
            }
            (AlertAction::Escalate(_) | AlertAction::AutoResolve, None) => {
                return Err(DomainError::invariant("alert plan requires an active alert"));
            }
        };

        if let Some(event) = event {
            info!(
                product_id = %product_id,
                outcome = ?outcome,
                classification = classification.map(|c| c.as_str()),
                available = record.available_stock(),
                "reorder alert updated"
            );
            self.notifier.publish(event, record.version());
        }

        Ok(Evaluation {
            product_id,
            classification,
            outcome,
            alert,
        })
    }

    pub fn acknowledge(&self, alert_id: AlertId, actor: UserId) -> DomainResult<ReorderAlert> {
        self.transition(alert_id, actor, AlertStatus::Acknowledged, |alert, now| {
            alert.acknowledge(actor, now)
        })
    }

    /// Close an alert by hand. Refused while stock still sits at or below a
    /// threshold.
    pub fn resolve(&self, alert_id: AlertId, actor: UserId) -> DomainResult<ReorderAlert> {
        self.transition(alert_id, actor, AlertStatus::Resolved, |alert, now| {
            let still_triggered = self.ledger.get_stock(alert.product_id)?.classification().is_some();
            alert.resolve(actor, still_triggered, now)
        })
    }

    pub fn dismiss(&self, alert_id: AlertId, actor: UserId) -> DomainResult<ReorderAlert> {
        self.transition(alert_id, actor, AlertStatus::Dismissed, |alert, now| alert.dismiss(actor, now))
    }

    fn transition(
        &self,
        alert_id: AlertId,
        actor: UserId,
        status: AlertStatus,
        change: impl Fn(&ReorderAlert, chrono::DateTime<chrono::Utc>) -> DomainResult<ReorderAlert>,
    ) -> DomainResult<ReorderAlert> {
        let now = self.ledger.now();
        let next = with_retry(self.ledger.retry_policy(), status.as_str(), || {
            let current = self.get(alert_id)?;
            let next = change(&current, now)?;
            self.alerts.compare_and_swap(current.version(), next.clone())?;
            Ok(next)
        })?;

        info!(alert_id = %alert_id, product_id = %next.product_id, status = status.as_str(), actor = %actor, "alert status changed");
        self.notifier.publish(
            InventoryEvent::ReorderAlertStatusChanged {
                product_id: next.product_id,
                alert_id,
                status,
                actor,
                occurred_at: now,
            },
            next.version(),
        );
        Ok(next)
    }

    /// Evaluate every product. Per-product failures are collected.
    pub fn scan_all(&self) -> DomainResult<ScanReport> {
        let mut report = ScanReport::default();
        for record in self.ledger.list_stock()? {
            match self.evaluate(record.product_id) {
                Ok(evaluation) => {
                    report.evaluated += 1;
                    match evaluation.outcome {
                        EvaluationOutcome::Raised => report.raised += 1,
                        EvaluationOutcome::Escalated => report.escalated += 1,
                        EvaluationOutcome::AutoResolved => report.resolved += 1,
                        EvaluationOutcome::Unchanged => {}
                    }
                }
                Err(e) => {
                    warn!(product_id = %record.product_id, error = %e, "reorder scan failed for product");
                    report.failed.push((record.product_id, e.to_string()));
                }
            }
        }
        info!(
            evaluated = report.evaluated,
            raised = report.raised,
            escalated = report.escalated,
            resolved = report.resolved,
            failed = report.failed.len(),
            "reorder scan finished"
        );
        Ok(report)
    }

    pub fn get(&self, alert_id: AlertId) -> DomainResult<ReorderAlert> {
        self.alerts
            .get(alert_id)?
            .ok_or_else(|| DomainError::not_found("reorder_alert", alert_id))
    }

    pub fn list(&self, query: &AlertQuery) -> DomainResult<Page<ReorderAlert>> {
        Ok(query.run(self.alerts.list()?))
    }
}
