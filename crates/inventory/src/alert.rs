use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AlertId, DomainError, DomainResult, ProductId, UserId, Versioned};

use crate::stock::StockRecord;

/// Reorder alert severity, ordered from least to most severe.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    Critical,
    OutOfStock,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowStock => "low_stock",
            AlertType::Critical => "critical",
            AlertType::OutOfStock => "out_of_stock",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "low_stock" => Ok(AlertType::LowStock),
            "critical" => Ok(AlertType::Critical),
            "out_of_stock" => Ok(AlertType::OutOfStock),
            other => Err(DomainError::validation(format!("unknown alert type '{other}'"))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    /// Open and acknowledged alerts still demand attention.
    pub fn is_active(&self) -> bool {
        matches!(self, AlertStatus::Open | AlertStatus::Acknowledged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "open" => Ok(AlertStatus::Open),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            "dismissed" => Ok(AlertStatus::Dismissed),
            other => Err(DomainError::validation(format!("unknown alert status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderAlert {
    pub id: AlertId,
    pub product_id: ProductId,
    pub alert_type: AlertType,
    pub current_stock: i64,
    pub reorder_point: i64,
    pub suggested_reorder_quantity: i64,
    pub alert_status: AlertStatus,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_by: Option<UserId>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub dismissed_by: Option<UserId>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Versioned for ReorderAlert {
    fn version(&self) -> u64 {
        self.version
    }
}

impl ReorderAlert {
    pub fn raise(alert_type: AlertType, record: &StockRecord, now: DateTime<Utc>) -> Self {
        let current_stock = record.available_stock();
        Self {
            id: AlertId::new(),
            product_id: record.product_id,
            alert_type,
            current_stock,
            reorder_point: record.thresholds().reorder_point,
            suggested_reorder_quantity: record.thresholds().suggested_reorder_quantity(current_stock),
            alert_status: AlertStatus::Open,
            triggered_at: now,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            dismissed_by: None,
            dismissed_at: None,
            version: 1,
        }
    }

    /// Raise severity in place. An acknowledged alert is reopened so the new
    /// severity is seen.
    pub fn escalate(&self, alert_type: AlertType, record: &StockRecord, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_active()?;
        if alert_type <= self.alert_type {
            return Err(DomainError::validation(format!(
                "{} does not escalate {}",
                alert_type.as_str(),
                self.alert_type.as_str()
            )));
        }
        let current_stock = record.available_stock();
        let mut next = self.clone();
        next.alert_type = alert_type;
        next.current_stock = current_stock;
        next.reorder_point = record.thresholds().reorder_point;
        next.suggested_reorder_quantity = record.thresholds().suggested_reorder_quantity(current_stock);
        next.alert_status = AlertStatus::Open;
        next.triggered_at = now;
        next.acknowledged_by = None;
        next.acknowledged_at = None;
        next.version += 1;
        Ok(next)
    }

    pub fn acknowledge(&self, actor: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.alert_status != AlertStatus::Open {
            return Err(self.closed_error("acknowledged"));
        }
        let mut next = self.clone();
        next.alert_status = AlertStatus::Acknowledged;
        next.acknowledged_by = Some(actor);
        next.acknowledged_at = Some(now);
        next.version += 1;
        Ok(next)
    }

    /// Resolve the alert. Refused while `still_triggered` (stock is still at
    /// or below a threshold).
    pub fn resolve(&self, actor: UserId, still_triggered: bool, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_active()?;
        if still_triggered {
            return Err(DomainError::validation(
                "stock is still at or below the reorder threshold",
            ));
        }
        let mut next = self.clone();
        next.alert_status = AlertStatus::Resolved;
        next.resolved_by = Some(actor);
        next.resolved_at = Some(now);
        next.version += 1;
        Ok(next)
    }

    pub fn dismiss(&self, actor: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_active()?;
        let mut next = self.clone();
        next.alert_status = AlertStatus::Dismissed;
        next.dismissed_by = Some(actor);
        next.dismissed_at = Some(now);
        next.version += 1;
        Ok(next)
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if self.alert_status.is_active() {
            Ok(())
        } else {
            Err(self.closed_error("changed"))
        }
    }

    fn closed_error(&self, verb: &str) -> DomainError {
        DomainError::already_processed(format!(
            "alert {} is {} and cannot be {verb}",
            self.id,
            self.alert_status.as_str()
        ))
    }
}

/// What an evaluation should do to a product's alerts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AlertAction {
    /// Nothing changes (idempotent re-evaluation, or de-escalation).
    Keep,
    /// No active alert exists; open one.
    Raise(AlertType),
    /// The active alert is less severe than the current classification.
    Escalate(AlertType),
    /// Stock recovered above every threshold; close the active alert.
    AutoResolve,
}

/// Decide the alert transition for the current stock record.
pub fn plan_evaluation(record: &StockRecord, active: Option<&ReorderAlert>) -> AlertAction {
    match (record.classification(), active) {
        (None, None) => AlertAction::Keep,
        (None, Some(_)) => AlertAction::AutoResolve,
        (Some(kind), None) => AlertAction::Raise(kind),
        (Some(kind), Some(alert)) if kind > alert.alert_type => AlertAction::Escalate(kind),
        (Some(_), Some(_)) => AlertAction::Keep,
    }
}
