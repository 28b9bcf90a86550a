use chrono::{DateTime, Utc};
use serde::Deserialize;

use stockledger_core::{DomainError, DomainResult, OrderId, ProductId, UserId};
use stockledger_infra::query::{
    AdjustmentFilter, AdjustmentQuery, AlertFilter, AlertQuery, AuditFilter, AuditQuery, Pagination,
    ReservationFilter, ReservationQuery,
};
use stockledger_inventory::{
    AdjustmentType, AlertStatus, AlertType, ApprovalStatus, Decision, NewAdjustment, OperationType,
    ReservationStatus, StockThresholds,
};
use stockledger_infra::adjustments::DecisionRequest;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    /// Generated when absent.
    pub product_id: Option<ProductId>,
    pub sku: String,
    pub name: Option<String>,
    pub initial_physical_stock: i64,
    #[serde(default)]
    pub thresholds: StockThresholds,
    pub unit_cost: Option<u64>,
    pub unit_price: Option<u64>,
    /// Quantity the catalog held before the ledger took over.
    pub legacy_stock_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceHoldRequest {
    pub reason: String,
    pub until: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct FulfillRequest {
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub product_id: ProductId,
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub quantity: i64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkAdjustmentsRequest {
    pub adjustments: Vec<NewAdjustment>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub decision: Decision,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDecisionsRequest {
    pub decisions: Vec<DecisionRequest>,
}

// -------------------------
// List query parameters
// -------------------------

/// Shared query string for every list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub product_id: Option<String>,
    pub order_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub actor: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListParams {
    fn product_id(&self) -> DomainResult<Option<ProductId>> {
        self.product_id.as_deref().map(str::parse).transpose()
    }

    fn actor(&self) -> DomainResult<Option<UserId>> {
        self.actor.as_deref().map(str::parse).transpose()
    }

    fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }

    fn sort<S: std::str::FromStr<Err = DomainError> + Default>(&self) -> DomainResult<S> {
        self.sort.as_deref().map(str::parse).transpose().map(Option::unwrap_or_default)
    }

    fn direction(&self) -> DomainResult<stockledger_infra::query::SortDirection> {
        self.direction
            .as_deref()
            .map(str::parse)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    pub fn reservation_query(&self) -> DomainResult<ReservationQuery> {
        Ok(ReservationQuery {
            filter: ReservationFilter {
                product_id: self.product_id()?,
                order_id: self.order_id.as_deref().map(str::parse).transpose()?,
                from: self.from,
                to: self.to,
                status: self.status.as_deref().map(ReservationStatus::parse).transpose()?,
            },
            sort: self.sort()?,
            direction: self.direction()?,
            pagination: self.pagination(),
        })
    }

    pub fn adjustment_query(&self) -> DomainResult<AdjustmentQuery> {
        Ok(AdjustmentQuery {
            filter: AdjustmentFilter {
                product_id: self.product_id()?,
                from: self.from,
                to: self.to,
                status: self.status.as_deref().map(ApprovalStatus::parse).transpose()?,
                adjustment_type: self.kind.as_deref().map(AdjustmentType::parse).transpose()?,
                actor: self.actor()?,
            },
            sort: self.sort()?,
            direction: self.direction()?,
            pagination: self.pagination(),
        })
    }

    pub fn alert_query(&self) -> DomainResult<AlertQuery> {
        Ok(AlertQuery {
            filter: AlertFilter {
                product_id: self.product_id()?,
                from: self.from,
                to: self.to,
                status: self.status.as_deref().map(AlertStatus::parse).transpose()?,
                alert_type: self.kind.as_deref().map(AlertType::parse).transpose()?,
                actor: self.actor()?,
            },
            sort: self.sort()?,
            direction: self.direction()?,
            pagination: self.pagination(),
        })
    }

    pub fn audit_query(&self) -> DomainResult<AuditQuery> {
        Ok(AuditQuery {
            filter: AuditFilter {
                product_id: self.product_id()?,
                from: self.from,
                to: self.to,
                operation_type: self.kind.as_deref().map(OperationType::parse).transpose()?,
                actor: self.actor()?,
            },
            sort: self.sort()?,
            direction: self.direction()?,
            pagination: self.pagination(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_infra::query::{AuditSort, SortDirection};

    #[test]
    fn list_params_map_to_typed_queries() {
        let product_id = ProductId::new();
        let params = ListParams {
            product_id: Some(product_id.to_string()),
            kind: Some("customer_return".to_string()),
            sort: Some("quantity_affected".to_string()),
            direction: Some("asc".to_string()),
            limit: Some(5_000),
            ..Default::default()
        };
        let query = params.audit_query().unwrap();

        assert_eq!(query.filter.product_id, Some(product_id));
        assert_eq!(query.filter.operation_type, Some(OperationType::CustomerReturn));
        assert_eq!(query.sort, AuditSort::QuantityAffected);
        assert_eq!(query.direction, SortDirection::Asc);
        assert_eq!(query.pagination.limit, 1000);
    }

    #[test]
    fn unknown_filter_values_are_rejected() {
        let params = ListParams {
            status: Some("shipped".to_string()),
            ..Default::default()
        };
        assert!(params.reservation_query().is_err());

        let params = ListParams {
            product_id: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(matches!(params.alert_query(), Err(DomainError::InvalidId(_))));
    }
}
