use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, OrderId, ProductId, ReservationId, Versioned};

/// Reservation lifecycle. Everything except `Active` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Fulfilled,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Fulfilled => "fulfilled",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "active" => Ok(ReservationStatus::Active),
            "fulfilled" => Ok(ReservationStatus::Fulfilled),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "expired" => Ok(ReservationStatus::Expired),
            other => Err(DomainError::validation(format!("unknown reservation status '{other}'"))),
        }
    }
}

/// Stock earmarked for one order.
///
/// `quantity_fulfilled` grows with partial fulfillments; the outstanding
/// (still reserved) quantity is `quantity_reserved - quantity_fulfilled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservation {
    pub id: ReservationId,
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub quantity_reserved: i64,
    pub quantity_fulfilled: i64,
    pub quantity_returned: i64,
    pub status: ReservationStatus,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Versioned for StockReservation {
    fn version(&self) -> u64 {
        self.version
    }
}

impl StockReservation {
    pub fn open(
        product_id: ProductId,
        order_id: OrderId,
        quantity: i64,
        reserved_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("reservation quantity must be positive"));
        }
        if expires_at <= reserved_at {
            return Err(DomainError::validation("reservation must expire after it is made"));
        }
        Ok(Self {
            id: ReservationId::new(),
            product_id,
            order_id,
            quantity_reserved: quantity,
            quantity_fulfilled: 0,
            quantity_returned: 0,
            status: ReservationStatus::Active,
            reserved_at,
            expires_at,
            fulfilled_at: None,
            cancelled_at: None,
            expired_at: None,
            version: 1,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Quantity still held against the ledger's reserved stock.
    pub fn outstanding(&self) -> i64 {
        if self.is_active() {
            self.quantity_reserved - self.quantity_fulfilled
        } else {
            0
        }
    }

    /// Quantity shipped and not yet returned.
    pub fn returnable(&self) -> i64 {
        self.quantity_fulfilled - self.quantity_returned
    }

    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at <= now
    }

    /// Ship `quantity` units; closes the reservation once nothing is outstanding.
    pub fn fulfill(&self, quantity: i64, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_active()?;
        if quantity <= 0 {
            return Err(DomainError::validation("fulfillment quantity must be positive"));
        }
        let outstanding = self.outstanding();
        if quantity > outstanding {
            return Err(DomainError::insufficient_reserved(quantity, outstanding));
        }
        let mut next = self.clone();
        next.quantity_fulfilled += quantity;
        next.fulfilled_at = Some(now);
        if next.quantity_fulfilled == next.quantity_reserved {
            next.status = ReservationStatus::Fulfilled;
        }
        next.version += 1;
        Ok(next)
    }

    pub fn cancel(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_active()?;
        let mut next = self.clone();
        next.status = ReservationStatus::Cancelled;
        next.cancelled_at = Some(now);
        next.version += 1;
        Ok(next)
    }

    pub fn expire(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_active()?;
        if self.expires_at > now {
            return Err(DomainError::validation("reservation has not expired yet"));
        }
        let mut next = self.clone();
        next.status = ReservationStatus::Expired;
        next.expired_at = Some(now);
        next.version += 1;
        Ok(next)
    }

    /// Add quantity to an active reservation (merge policy).
    pub fn merge(&self, quantity: i64, expires_at: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_active()?;
        if quantity <= 0 {
            return Err(DomainError::validation("reservation quantity must be positive"));
        }
        let mut next = self.clone();
        next.quantity_reserved += quantity;
        next.expires_at = next.expires_at.max(expires_at);
        next.version += 1;
        Ok(next)
    }

    /// Book a customer return against shipped quantity. Status is untouched.
    pub fn record_return(&self, quantity: i64) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("return quantity must be positive"));
        }
        let returnable = self.returnable();
        if quantity > returnable {
            return Err(DomainError::validation(format!(
                "return of {quantity} exceeds shipped-and-unreturned quantity {returnable}"
            )));
        }
        let mut next = self.clone();
        next.quantity_returned += quantity;
        next.version += 1;
        Ok(next)
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DomainError::already_processed(format!(
                "reservation {} is {}",
                self.id,
                self.status.as_str()
            )))
        }
    }
}
