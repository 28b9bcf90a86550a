//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every stock operation reports failure through this taxonomy. Business-rule
/// variants carry the numbers a caller needs to act on the failure (shortfall,
/// resulting stock), so the message is actionable without a second lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input, rejected before the ledger is touched.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Unknown product, reservation, adjustment or alert.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Not enough available stock to satisfy a reservation.
    #[error("insufficient stock: requested {requested}, available {available} (short by {shortfall})")]
    InsufficientStock {
        requested: i64,
        available: i64,
        shortfall: i64,
    },

    /// The active reservation does not cover the requested quantity.
    #[error(
        "insufficient reserved quantity: requested {requested}, reserved {reserved} (short by {shortfall})"
    )]
    InsufficientReservedQuantity {
        requested: i64,
        reserved: i64,
        shortfall: i64,
    },

    /// A correction would push stock below zero.
    #[error("negative stock rejected: {current} {delta:+} would leave {resulting}")]
    NegativeStockRejected {
        current: i64,
        delta: i64,
        resulting: i64,
    },

    /// The adjustment has already been approved or rejected.
    #[error("already decided: {0}")]
    AlreadyDecided(String),

    /// The operation was already applied (reservation exists, alert closed, ...).
    #[error("already processed: {0}")]
    AlreadyProcessed(String),

    /// Optimistic concurrency retries were exhausted.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// The ledger refused a write that would break a stock invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Missing or insufficient actor identity.
    #[error("unauthorized")]
    Unauthorized,

    /// Backing storage is not provisioned or cannot be reached.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
            shortfall: requested - available,
        }
    }

    pub fn insufficient_reserved(requested: i64, reserved: i64) -> Self {
        Self::InsufficientReservedQuantity {
            requested,
            reserved,
            shortfall: requested - reserved,
        }
    }

    pub fn negative_stock(current: i64, delta: i64) -> Self {
        Self::NegativeStockRejected {
            current,
            delta,
            resulting: current + delta,
        }
    }

    pub fn already_decided(msg: impl Into<String>) -> Self {
        Self::AlreadyDecided(msg.into())
    }

    pub fn already_processed(msg: impl Into<String>) -> Self {
        Self::AlreadyProcessed(msg.into())
    }

    pub fn concurrent_modification(msg: impl Into<String>) -> Self {
        Self::ConcurrentModification(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::DependencyUnavailable(msg.into())
    }

    /// Stable machine-readable code (used by API error bodies and bulk reports).
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::InsufficientReservedQuantity { .. } => "insufficient_reserved_quantity",
            DomainError::NegativeStockRejected { .. } => "negative_stock_rejected",
            DomainError::AlreadyDecided(_) => "already_decided",
            DomainError::AlreadyProcessed(_) => "already_processed",
            DomainError::ConcurrentModification(_) => "concurrent_modification",
            DomainError::InvariantViolation(_) => "invariant_violation",
            DomainError::Unauthorized => "unauthorized",
            DomainError::DependencyUnavailable(_) => "dependency_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_reports_shortfall() {
        let err = DomainError::insufficient_stock(8, 5);
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 8,
                available: 5,
                shortfall: 3
            }
        );
        assert!(err.to_string().contains("short by 3"));
    }

    #[test]
    fn negative_stock_message_shows_signed_delta() {
        let err = DomainError::negative_stock(5, -1000);
        assert_eq!(err.to_string(), "negative stock rejected: 5 -1000 would leave -995");
    }
}
