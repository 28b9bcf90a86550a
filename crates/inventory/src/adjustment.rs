use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AdjustmentId, DomainError, DomainResult, ProductId, UserId, Versioned};

/// Kind of manual stock correction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    PhysicalCount,
    DamageWriteoff,
    TheftLoss,
    CountingError,
    ManualCorrection,
    SupplierReturn,
    QualityControlReject,
}

/// Which signs a correction type accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SignRule {
    DecreaseOnly,
    Either,
}

impl AdjustmentType {
    pub fn sign_rule(&self) -> SignRule {
        match self {
            AdjustmentType::DamageWriteoff
            | AdjustmentType::TheftLoss
            | AdjustmentType::SupplierReturn
            | AdjustmentType::QualityControlReject => SignRule::DecreaseOnly,
            AdjustmentType::PhysicalCount
            | AdjustmentType::CountingError
            | AdjustmentType::ManualCorrection => SignRule::Either,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentType::PhysicalCount => "physical_count",
            AdjustmentType::DamageWriteoff => "damage_writeoff",
            AdjustmentType::TheftLoss => "theft_loss",
            AdjustmentType::CountingError => "counting_error",
            AdjustmentType::ManualCorrection => "manual_correction",
            AdjustmentType::SupplierReturn => "supplier_return",
            AdjustmentType::QualityControlReject => "quality_control_reject",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "physical_count" => Ok(AdjustmentType::PhysicalCount),
            "damage_writeoff" => Ok(AdjustmentType::DamageWriteoff),
            "theft_loss" => Ok(AdjustmentType::TheftLoss),
            "counting_error" => Ok(AdjustmentType::CountingError),
            "manual_correction" => Ok(AdjustmentType::ManualCorrection),
            "supplier_return" => Ok(AdjustmentType::SupplierReturn),
            "quality_control_reject" => Ok(AdjustmentType::QualityControlReject),
            other => Err(DomainError::validation(format!("unknown adjustment type '{other}'"))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(DomainError::validation(format!("unknown approval status '{other}'"))),
        }
    }
}

/// Approver's verdict on a pending adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for ApprovalStatus {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approved => ApprovalStatus::Approved,
            Decision::Rejected => ApprovalStatus::Rejected,
        }
    }
}

/// Input for a new adjustment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdjustment {
    pub product_id: ProductId,
    pub adjustment_type: AdjustmentType,
    pub reason_code: String,
    pub quantity_adjusted: i64,
    pub description: Option<String>,
    #[serde(default)]
    pub supporting_documents: Vec<String>,
    pub witness_user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub id: AdjustmentId,
    pub product_id: ProductId,
    pub adjustment_type: AdjustmentType,
    pub reason_code: String,
    pub description: Option<String>,
    pub quantity_adjusted: i64,
    /// Snapshot taken at submission; this is what the approver signs off on.
    pub previous_physical_stock: i64,
    pub new_physical_stock: i64,
    /// Physical stock around the ledger write made on approval. Differs from
    /// the submitted snapshot when stock moved while the request was pending.
    #[serde(default)]
    pub applied_previous_physical_stock: Option<i64>,
    #[serde(default)]
    pub applied_new_physical_stock: Option<i64>,
    pub approval_status: ApprovalStatus,
    pub requested_by: UserId,
    pub approved_by: Option<UserId>,
    pub decision_notes: Option<String>,
    pub witness_user_id: Option<UserId>,
    pub supporting_documents: Vec<String>,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Versioned for InventoryAdjustment {
    fn version(&self) -> u64 {
        self.version
    }
}

impl InventoryAdjustment {
    /// Validate a request against the current physical stock and build the
    /// pending record.
    pub fn submit(
        request: NewAdjustment,
        current_physical: i64,
        requested_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if request.reason_code.trim().is_empty() {
            return Err(DomainError::validation("reason_code cannot be empty"));
        }
        if request.quantity_adjusted == 0 {
            return Err(DomainError::validation("quantity_adjusted cannot be zero"));
        }
        if request.adjustment_type.sign_rule() == SignRule::DecreaseOnly && request.quantity_adjusted > 0 {
            return Err(DomainError::validation(format!(
                "{} adjustments can only decrease stock",
                request.adjustment_type.as_str()
            )));
        }
        if request.witness_user_id == Some(requested_by) {
            return Err(DomainError::validation("witness must differ from requester"));
        }

        let new_physical = current_physical
            .checked_add(request.quantity_adjusted)
            .ok_or_else(|| DomainError::validation("quantity_adjusted out of range"))?;
        if new_physical < 0 {
            return Err(DomainError::negative_stock(current_physical, request.quantity_adjusted));
        }

        Ok(Self {
            id: AdjustmentId::new(),
            product_id: request.product_id,
            adjustment_type: request.adjustment_type,
            reason_code: request.reason_code,
            description: request.description,
            quantity_adjusted: request.quantity_adjusted,
            previous_physical_stock: current_physical,
            new_physical_stock: new_physical,
            applied_previous_physical_stock: None,
            applied_new_physical_stock: None,
            approval_status: ApprovalStatus::Pending,
            requested_by,
            approved_by: None,
            decision_notes: None,
            witness_user_id: request.witness_user_id,
            supporting_documents: request.supporting_documents,
            requested_at: now,
            decided_at: None,
            version: 1,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.approval_status == ApprovalStatus::Pending
    }

    /// Record the decision. Valid exactly once, from `Pending`.
    pub fn decide(
        &self,
        decision: Decision,
        approver: UserId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !self.is_pending() {
            return Err(DomainError::already_decided(format!(
                "adjustment {} is already {}",
                self.id,
                self.approval_status.as_str()
            )));
        }
        let mut next = self.clone();
        next.approval_status = decision.into();
        next.approved_by = Some(approver);
        next.decision_notes = notes;
        next.decided_at = Some(now);
        next.version += 1;
        Ok(next)
    }

    /// Record what approval applied to the ledger. The submitted snapshot is
    /// left as it was.
    pub fn with_applied_stock(&self, previous_physical: i64, new_physical: i64) -> Self {
        let mut next = self.clone();
        next.applied_previous_physical_stock = Some(previous_physical);
        next.applied_new_physical_stock = Some(new_physical);
        next.version += 1;
        next
    }

    /// True when approval landed on a different stock level than the one
    /// the request was submitted against.
    pub fn applied_off_snapshot(&self) -> bool {
        self.applied_previous_physical_stock
            .is_some_and(|applied| applied != self.previous_physical_stock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: AdjustmentType, qty: i64) -> NewAdjustment {
        NewAdjustment {
            product_id: ProductId::new(),
            adjustment_type: kind,
            reason_code: "CYCLE-COUNT".to_string(),
            quantity_adjusted: qty,
            description: None,
            supporting_documents: vec![],
            witness_user_id: None,
        }
    }

    #[test]
    fn submit_computes_new_physical() {
        let adj = InventoryAdjustment::submit(request(AdjustmentType::PhysicalCount, -3), 10, UserId::new(), Utc::now())
            .unwrap();
        assert_eq!(adj.previous_physical_stock, 10);
        assert_eq!(adj.new_physical_stock, 7);
        assert!(adj.is_pending());
    }

    #[test]
    fn submit_rejects_negative_result() {
        let err = InventoryAdjustment::submit(
            request(AdjustmentType::ManualCorrection, -1000),
            5,
            UserId::new(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DomainError::NegativeStockRejected {
                current: 5,
                delta: -1000,
                resulting: -995
            }
        );
    }

    #[test]
    fn writeoffs_cannot_add_stock() {
        let err = InventoryAdjustment::submit(request(AdjustmentType::DamageWriteoff, 2), 5, UserId::new(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn requester_cannot_witness_own_adjustment() {
        let requester = UserId::new();
        let mut req = request(AdjustmentType::TheftLoss, -1);
        req.witness_user_id = Some(requester);
        assert!(InventoryAdjustment::submit(req, 5, requester, Utc::now()).is_err());
    }

    #[test]
    fn applied_stock_keeps_submitted_snapshot() {
        let adj = InventoryAdjustment::submit(request(AdjustmentType::PhysicalCount, -4), 20, UserId::new(), Utc::now())
            .unwrap();
        assert!(!adj.applied_off_snapshot());

        let applied = adj.with_applied_stock(25, 21);
        assert_eq!((applied.previous_physical_stock, applied.new_physical_stock), (20, 16));
        assert_eq!(applied.applied_previous_physical_stock, Some(25));
        assert_eq!(applied.applied_new_physical_stock, Some(21));
        assert!(applied.applied_off_snapshot());
        assert_eq!(applied.version, adj.version + 1);
    }

    #[test]
    fn decide_only_once() {
        let adj = InventoryAdjustment::submit(request(AdjustmentType::CountingError, 4), 1, UserId::new(), Utc::now())
            .unwrap();
        let approver = UserId::new();
        let approved = adj.decide(Decision::Approved, approver, None, Utc::now()).unwrap();
        assert_eq!(approved.approval_status, ApprovalStatus::Approved);
        assert_eq!(approved.approved_by, Some(approver));

        let err = approved
            .decide(Decision::Rejected, approver, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyDecided(_)));
    }
}
