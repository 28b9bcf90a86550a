//! Filtered, sorted and paginated listings over the stock stores.
//!
//! Listings are read-only and paginated by default.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, OrderId, ProductId, UserId};
use stockledger_inventory::{
    AdjustmentType, AlertStatus, AlertType, ApprovalStatus, AuditLogEntry, InventoryAdjustment, OperationType,
    ReorderAlert, ReservationStatus, StockReservation,
};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 1000;

/// Page-based pagination (`page` is 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(DomainError::validation(format!("unknown sort direction '{other}'"))),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches across all pages.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

pub trait Filter<T> {
    fn matches(&self, item: &T) -> bool;
}

pub trait SortKey<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Listing request: filter, sort field, direction and page.
#[derive(Debug, Clone, Default)]
pub struct Query<F, S> {
    pub filter: F,
    pub sort: S,
    pub direction: SortDirection,
    pub pagination: Pagination,
}

impl<F, S> Query<F, S> {
    /// Filter, sort and cut one page out of `items`.
    pub fn run<T>(&self, items: Vec<T>) -> Page<T>
    where
        F: Filter<T>,
        S: SortKey<T>,
    {
        let mut matched: Vec<T> = items.into_iter().filter(|i| self.filter.matches(i)).collect();
        matched.sort_by(|a, b| match self.direction {
            SortDirection::Asc => self.sort.compare(a, b),
            SortDirection::Desc => self.sort.compare(b, a),
        });

        let total = matched.len();
        let offset = self.pagination.offset().min(total);
        let items: Vec<T> = matched
            .into_iter()
            .skip(offset)
            .take(self.pagination.limit as usize)
            .collect();
        let has_more = offset + items.len() < total;

        Page {
            items,
            total: total as u64,
            page: self.pagination.page,
            limit: self.pagination.limit,
            has_more,
        }
    }
}

fn within(ts: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.is_none_or(|f| ts >= f) && to.is_none_or(|t| ts <= t)
}

fn unknown_sort(field: &str) -> DomainError {
    DomainError::validation(format!("unknown sort field '{field}'"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Adjustments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct AdjustmentFilter {
    pub product_id: Option<ProductId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<ApprovalStatus>,
    pub adjustment_type: Option<AdjustmentType>,
    /// Requester or approver.
    pub actor: Option<UserId>,
}

impl Filter<InventoryAdjustment> for AdjustmentFilter {
    fn matches(&self, a: &InventoryAdjustment) -> bool {
        self.product_id.is_none_or(|p| a.product_id == p)
            && within(a.requested_at, self.from, self.to)
            && self.status.is_none_or(|s| a.approval_status == s)
            && self.adjustment_type.is_none_or(|t| a.adjustment_type == t)
            && self
                .actor
                .is_none_or(|u| a.requested_by == u || a.approved_by == Some(u))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdjustmentSort {
    #[default]
    RequestedAt,
    DecidedAt,
    QuantityAdjusted,
}

impl SortKey<InventoryAdjustment> for AdjustmentSort {
    fn compare(&self, a: &InventoryAdjustment, b: &InventoryAdjustment) -> Ordering {
        let primary = match self {
            AdjustmentSort::RequestedAt => a.requested_at.cmp(&b.requested_at),
            AdjustmentSort::DecidedAt => a.decided_at.cmp(&b.decided_at),
            AdjustmentSort::QuantityAdjusted => a.quantity_adjusted.cmp(&b.quantity_adjusted),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

impl FromStr for AdjustmentSort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested_at" => Ok(AdjustmentSort::RequestedAt),
            "decided_at" => Ok(AdjustmentSort::DecidedAt),
            "quantity_adjusted" => Ok(AdjustmentSort::QuantityAdjusted),
            other => Err(unknown_sort(other)),
        }
    }
}

pub type AdjustmentQuery = Query<AdjustmentFilter, AdjustmentSort>;

// ─────────────────────────────────────────────────────────────────────────────
// Alerts
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub product_id: Option<ProductId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
    /// Whoever acknowledged, resolved or dismissed the alert.
    pub actor: Option<UserId>,
}

impl Filter<ReorderAlert> for AlertFilter {
    fn matches(&self, a: &ReorderAlert) -> bool {
        self.product_id.is_none_or(|p| a.product_id == p)
            && within(a.triggered_at, self.from, self.to)
            && self.status.is_none_or(|s| a.alert_status == s)
            && self.alert_type.is_none_or(|t| a.alert_type == t)
            && self.actor.is_none_or(|u| {
                [a.acknowledged_by, a.resolved_by, a.dismissed_by].contains(&Some(u))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertSort {
    #[default]
    TriggeredAt,
    Severity,
    CurrentStock,
}

impl SortKey<ReorderAlert> for AlertSort {
    fn compare(&self, a: &ReorderAlert, b: &ReorderAlert) -> Ordering {
        let primary = match self {
            AlertSort::TriggeredAt => a.triggered_at.cmp(&b.triggered_at),
            AlertSort::Severity => a.alert_type.cmp(&b.alert_type),
            AlertSort::CurrentStock => a.current_stock.cmp(&b.current_stock),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

impl FromStr for AlertSort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "triggered_at" => Ok(AlertSort::TriggeredAt),
            "severity" | "alert_type" => Ok(AlertSort::Severity),
            "current_stock" => Ok(AlertSort::CurrentStock),
            other => Err(unknown_sort(other)),
        }
    }
}

pub type AlertQuery = Query<AlertFilter, AlertSort>;

// ─────────────────────────────────────────────────────────────────────────────
// Reservations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub product_id: Option<ProductId>,
    pub order_id: Option<OrderId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<ReservationStatus>,
}

impl Filter<StockReservation> for ReservationFilter {
    fn matches(&self, r: &StockReservation) -> bool {
        self.product_id.is_none_or(|p| r.product_id == p)
            && self.order_id.is_none_or(|o| r.order_id == o)
            && within(r.reserved_at, self.from, self.to)
            && self.status.is_none_or(|s| r.status == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservationSort {
    #[default]
    ReservedAt,
    ExpiresAt,
    QuantityReserved,
}

impl SortKey<StockReservation> for ReservationSort {
    fn compare(&self, a: &StockReservation, b: &StockReservation) -> Ordering {
        let primary = match self {
            ReservationSort::ReservedAt => a.reserved_at.cmp(&b.reserved_at),
            ReservationSort::ExpiresAt => a.expires_at.cmp(&b.expires_at),
            ReservationSort::QuantityReserved => a.quantity_reserved.cmp(&b.quantity_reserved),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

impl FromStr for ReservationSort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved_at" => Ok(ReservationSort::ReservedAt),
            "expires_at" => Ok(ReservationSort::ExpiresAt),
            "quantity_reserved" => Ok(ReservationSort::QuantityReserved),
            other => Err(unknown_sort(other)),
        }
    }
}

pub type ReservationQuery = Query<ReservationFilter, ReservationSort>;

// ─────────────────────────────────────────────────────────────────────────────
// Audit log
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub product_id: Option<ProductId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub operation_type: Option<OperationType>,
    pub actor: Option<UserId>,
}

impl Filter<AuditLogEntry> for AuditFilter {
    fn matches(&self, e: &AuditLogEntry) -> bool {
        self.product_id.is_none_or(|p| e.product_id == p)
            && within(e.recorded_at, self.from, self.to)
            && self.operation_type.is_none_or(|op| e.operation_type == op)
            && self.actor.is_none_or(|u| e.actor == u)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditSort {
    #[default]
    RecordedAt,
    QuantityAffected,
    VersionAfter,
}

impl SortKey<AuditLogEntry> for AuditSort {
    fn compare(&self, a: &AuditLogEntry, b: &AuditLogEntry) -> Ordering {
        let primary = match self {
            AuditSort::RecordedAt => a.recorded_at.cmp(&b.recorded_at),
            AuditSort::QuantityAffected => a.quantity_affected.cmp(&b.quantity_affected),
            AuditSort::VersionAfter => a.version_after.cmp(&b.version_after),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

impl FromStr for AuditSort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recorded_at" => Ok(AuditSort::RecordedAt),
            "quantity_affected" => Ok(AuditSort::QuantityAffected),
            "version_after" => Ok(AuditSort::VersionAfter),
            other => Err(unknown_sort(other)),
        }
    }
}

pub type AuditQuery = Query<AuditFilter, AuditSort>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reservations(n: i64) -> Vec<StockReservation> {
        let base = Utc::now();
        let product = ProductId::new();
        (0..n)
            .map(|i| {
                let at = base + Duration::seconds(i);
                StockReservation::open(product, OrderId::new(), i + 1, at, at + Duration::minutes(5)).unwrap()
            })
            .collect()
    }

    #[test]
    fn pagination_defaults_and_caps() {
        assert_eq!(Pagination::new(None, None), Pagination { page: 1, limit: 50 });
        assert_eq!(Pagination::new(Some(0), Some(5000)).limit, MAX_LIMIT);
        assert_eq!(Pagination::new(Some(0), None).page, 1);
    }

    #[test]
    fn pages_walk_sorted_results() {
        let query = ReservationQuery {
            sort: ReservationSort::QuantityReserved,
            direction: SortDirection::Asc,
            pagination: Pagination::new(Some(2), Some(3)),
            ..Default::default()
        };
        let page = query.run(reservations(7));
        let quantities: Vec<i64> = page.items.iter().map(|r| r.quantity_reserved).collect();
        assert_eq!(quantities, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert!(page.has_more);
    }

    #[test]
    fn default_direction_is_newest_first() {
        let page = ReservationQuery::default().run(reservations(3));
        assert_eq!(page.items[0].quantity_reserved, 3);
        assert!(!page.has_more);
    }

    #[test]
    fn filter_by_status_and_window() {
        let mut all = reservations(4);
        all[1] = all[1].cancel(Utc::now()).unwrap();
        let cutoff = all[2].reserved_at;
        let query = ReservationQuery {
            filter: ReservationFilter {
                status: Some(ReservationStatus::Active),
                to: Some(cutoff),
                ..Default::default()
            },
            ..Default::default()
        };
        let page = query.run(all);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn unknown_sort_field_is_validation_error() {
        assert!(matches!(
            "price".parse::<AuditSort>(),
            Err(DomainError::Validation(_))
        ));
        assert_eq!("ASC".parse::<SortDirection>().unwrap(), SortDirection::Asc);
    }
}
