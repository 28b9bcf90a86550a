use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::{DomainError, DomainResult, ProductId, Versioned};

use crate::alert::AlertType;

/// Physical, reserved and available stock as one composite value.
///
/// Fields are private: the only way to obtain a different value is
/// [`StockLevels::apply`], which moves all three together and refuses any
/// result where `available = physical - reserved` would not hold with every
/// component non-negative.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStockLevels")]
pub struct StockLevels {
    physical_stock: i64,
    reserved_stock: i64,
    available_stock: i64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum StockLevelsError {
    #[error("physical stock would become negative ({0})")]
    NegativePhysical(i64),

    #[error("reserved stock would become negative ({0})")]
    NegativeReserved(i64),

    #[error("reserved stock ({reserved}) would exceed physical stock ({physical})")]
    ReservedExceedsPhysical { physical: i64, reserved: i64 },

    #[error("stock arithmetic overflow")]
    Overflow,
}

impl From<StockLevelsError> for DomainError {
    fn from(value: StockLevelsError) -> Self {
        DomainError::invariant(value.to_string())
    }
}

impl StockLevels {
    pub fn new(physical_stock: i64, reserved_stock: i64) -> Result<Self, StockLevelsError> {
        if physical_stock < 0 {
            return Err(StockLevelsError::NegativePhysical(physical_stock));
        }
        if reserved_stock < 0 {
            return Err(StockLevelsError::NegativeReserved(reserved_stock));
        }
        if reserved_stock > physical_stock {
            return Err(StockLevelsError::ReservedExceedsPhysical {
                physical: physical_stock,
                reserved: reserved_stock,
            });
        }
        Ok(Self {
            physical_stock,
            reserved_stock,
            available_stock: physical_stock - reserved_stock,
        })
    }

    pub fn empty() -> Self {
        Self {
            physical_stock: 0,
            reserved_stock: 0,
            available_stock: 0,
        }
    }

    pub fn physical(&self) -> i64 {
        self.physical_stock
    }

    pub fn reserved(&self) -> i64 {
        self.reserved_stock
    }

    pub fn available(&self) -> i64 {
        self.available_stock
    }

    /// Compute the levels after a composite delta.
    pub fn apply(&self, physical_delta: i64, reserved_delta: i64) -> Result<Self, StockLevelsError> {
        let physical = self
            .physical_stock
            .checked_add(physical_delta)
            .ok_or(StockLevelsError::Overflow)?;
        let reserved = self
            .reserved_stock
            .checked_add(reserved_delta)
            .ok_or(StockLevelsError::Overflow)?;
        Self::new(physical, reserved)
    }
}

#[derive(Deserialize)]
struct RawStockLevels {
    physical_stock: i64,
    reserved_stock: i64,
    available_stock: i64,
}

impl TryFrom<RawStockLevels> for StockLevels {
    type Error = String;

    fn try_from(raw: RawStockLevels) -> Result<Self, Self::Error> {
        let levels = StockLevels::new(raw.physical_stock, raw.reserved_stock).map_err(|e| e.to_string())?;
        if levels.available_stock != raw.available_stock {
            return Err(format!(
                "available_stock {} does not equal physical - reserved ({})",
                raw.available_stock, levels.available_stock
            ));
        }
        Ok(levels)
    }
}

/// Reorder configuration supplied by the catalog.
///
/// `max_stock_level` is informational only and never caps stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockThresholds {
    pub min_stock_level: i64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub max_stock_level: i64,
}

impl StockThresholds {
    pub fn validate(&self) -> DomainResult<()> {
        let fields = [
            ("min_stock_level", self.min_stock_level),
            ("reorder_point", self.reorder_point),
            ("reorder_quantity", self.reorder_quantity),
            ("max_stock_level", self.max_stock_level),
        ];
        for (name, value) in fields {
            if value < 0 {
                return Err(DomainError::validation(format!("{name} cannot be negative")));
            }
        }
        Ok(())
    }

    /// Quantity to suggest on a reorder alert.
    ///
    /// Uses the configured `reorder_quantity`, falling back to topping up to
    /// `max_stock_level`.
    pub fn suggested_reorder_quantity(&self, current_stock: i64) -> i64 {
        if self.reorder_quantity > 0 {
            self.reorder_quantity
        } else {
            (self.max_stock_level - current_stock).max(0)
        }
    }
}

/// Canonical reorder classification of an available-stock level.
///
/// Used by the alert engine, the derived `stock_status`, and consistency
/// reports alike:
/// - `0` is out of stock regardless of thresholds
/// - at or below `min_stock_level` is critical
/// - at or below `reorder_point` is low
pub fn classify(available_stock: i64, thresholds: &StockThresholds) -> Option<AlertType> {
    if available_stock <= 0 {
        Some(AlertType::OutOfStock)
    } else if available_stock <= thresholds.min_stock_level {
        Some(AlertType::Critical)
    } else if available_stock <= thresholds.reorder_point {
        Some(AlertType::LowStock)
    } else {
        None
    }
}

/// Derived stock classification stored on the record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    Critical,
    OutOfStock,
}

impl StockStatus {
    pub fn derive(levels: &StockLevels, thresholds: &StockThresholds) -> Self {
        match classify(levels.available(), thresholds) {
            None => StockStatus::InStock,
            Some(AlertType::LowStock) => StockStatus::LowStock,
            Some(AlertType::Critical) => StockStatus::Critical,
            Some(AlertType::OutOfStock) => StockStatus::OutOfStock,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::Critical => "critical",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

/// Temporary block on new reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHold {
    pub reason: String,
    pub until: DateTime<Utc>,
}

/// Canonical per-product stock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub sku: String,
    #[serde(flatten)]
    levels: StockLevels,
    #[serde(flatten)]
    thresholds: StockThresholds,
    stock_status: StockStatus,
    version: u64,
    pub last_stock_update: DateTime<Utc>,
    hold: Option<StockHold>,
}

impl Versioned for StockRecord {
    fn version(&self) -> u64 {
        self.version
    }
}

impl StockRecord {
    /// Create the record for a newly registered product (version 1).
    pub fn register(
        product_id: ProductId,
        sku: impl Into<String>,
        initial_physical: i64,
        thresholds: StockThresholds,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let sku = sku.into();
        if sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if initial_physical < 0 {
            return Err(DomainError::validation("initial physical stock cannot be negative"));
        }
        thresholds.validate()?;

        let levels = StockLevels::new(initial_physical, 0)?;
        Ok(Self {
            product_id,
            sku,
            stock_status: StockStatus::derive(&levels, &thresholds),
            levels,
            thresholds,
            version: 1,
            last_stock_update: now,
            hold: None,
        })
    }

    pub fn levels(&self) -> &StockLevels {
        &self.levels
    }

    pub fn physical_stock(&self) -> i64 {
        self.levels.physical()
    }

    pub fn reserved_stock(&self) -> i64 {
        self.levels.reserved()
    }

    pub fn available_stock(&self) -> i64 {
        self.levels.available()
    }

    pub fn thresholds(&self) -> &StockThresholds {
        &self.thresholds
    }

    pub fn stock_status(&self) -> StockStatus {
        self.stock_status
    }

    pub fn hold(&self) -> Option<&StockHold> {
        self.hold.as_ref()
    }

    /// Active hold at `now`, if any.
    pub fn active_hold(&self, now: DateTime<Utc>) -> Option<&StockHold> {
        self.hold.as_ref().filter(|h| h.until > now)
    }

    pub fn classification(&self) -> Option<AlertType> {
        classify(self.available_stock(), &self.thresholds)
    }

    /// Next version of this record after a composite stock delta.
    pub fn with_delta(
        &self,
        physical_delta: i64,
        reserved_delta: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, StockLevelsError> {
        let levels = self.levels.apply(physical_delta, reserved_delta)?;
        let mut next = self.clone();
        next.levels = levels;
        next.stock_status = StockStatus::derive(&levels, &next.thresholds);
        next.version += 1;
        next.last_stock_update = now;
        Ok(next)
    }

    /// Next version with new reorder configuration (quantities unchanged).
    pub fn with_thresholds(&self, thresholds: StockThresholds) -> DomainResult<Self> {
        thresholds.validate()?;
        let mut next = self.clone();
        next.thresholds = thresholds;
        next.stock_status = StockStatus::derive(&next.levels, &thresholds);
        next.version += 1;
        Ok(next)
    }

    /// Next version with a hold placed or cleared (quantities unchanged).
    pub fn with_hold(&self, hold: Option<StockHold>, now: DateTime<Utc>) -> DomainResult<Self> {
        if let Some(h) = &hold {
            if h.reason.trim().is_empty() {
                return Err(DomainError::validation("hold reason cannot be empty"));
            }
            if h.until <= now {
                return Err(DomainError::validation("hold must end in the future"));
            }
        }
        let mut next = self.clone();
        next.hold = hold;
        next.version += 1;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn thresholds(min: i64, reorder: i64) -> StockThresholds {
        StockThresholds {
            min_stock_level: min,
            reorder_point: reorder,
            reorder_quantity: 50,
            max_stock_level: 100,
        }
    }

    fn record(physical: i64) -> StockRecord {
        StockRecord::register(ProductId::new(), "SKU-1", physical, thresholds(3, 10), Utc::now()).unwrap()
    }

    #[test]
    fn register_starts_at_version_one_with_nothing_reserved() {
        let r = record(20);
        assert_eq!(r.version(), 1);
        assert_eq!(r.physical_stock(), 20);
        assert_eq!(r.reserved_stock(), 0);
        assert_eq!(r.available_stock(), 20);
        assert_eq!(r.stock_status(), StockStatus::InStock);
    }

    #[test]
    fn register_rejects_blank_sku_and_negative_stock() {
        let t = thresholds(0, 0);
        assert!(StockRecord::register(ProductId::new(), " ", 1, t, Utc::now()).is_err());
        assert!(StockRecord::register(ProductId::new(), "A", -1, t, Utc::now()).is_err());
    }

    #[test]
    fn reserving_more_than_physical_is_refused() {
        let levels = StockLevels::new(5, 0).unwrap();
        assert_eq!(
            levels.apply(0, 6),
            Err(StockLevelsError::ReservedExceedsPhysical { physical: 5, reserved: 6 })
        );
    }

    #[test]
    fn fulfillment_delta_keeps_available_unchanged() {
        let levels = StockLevels::new(20, 8).unwrap();
        let after = levels.apply(-8, -8).unwrap();
        assert_eq!(after.physical(), 12);
        assert_eq!(after.reserved(), 0);
        assert_eq!(after.available(), levels.available());
    }

    #[test]
    fn with_delta_bumps_version_and_status() {
        let r = record(12);
        let next = r.with_delta(-4, 0, Utc::now()).unwrap();
        assert_eq!(next.version(), 2);
        assert_eq!(next.stock_status(), StockStatus::LowStock);
    }

    #[test]
    fn classification_order() {
        let t = thresholds(3, 10);
        assert_eq!(classify(0, &t), Some(AlertType::OutOfStock));
        assert_eq!(classify(3, &t), Some(AlertType::Critical));
        assert_eq!(classify(4, &t), Some(AlertType::LowStock));
        assert_eq!(classify(10, &t), Some(AlertType::LowStock));
        assert_eq!(classify(11, &t), None);
    }

    #[test]
    fn zero_overrides_zero_thresholds() {
        assert_eq!(classify(0, &StockThresholds::default()), Some(AlertType::OutOfStock));
        assert_eq!(classify(1, &StockThresholds::default()), None);
    }

    #[test]
    fn suggested_quantity_falls_back_to_max_level() {
        let t = StockThresholds {
            min_stock_level: 0,
            reorder_point: 10,
            reorder_quantity: 0,
            max_stock_level: 40,
        };
        assert_eq!(t.suggested_reorder_quantity(8), 32);
        assert_eq!(t.suggested_reorder_quantity(50), 0);
    }

    #[test]
    fn inconsistent_raw_levels_are_refused() {
        let raw = RawStockLevels {
            physical_stock: 10,
            reserved_stock: 2,
            available_stock: 9,
        };
        assert!(StockLevels::try_from(raw).is_err());
    }

    #[test]
    fn hold_must_be_in_future() {
        let r = record(5);
        let now = Utc::now();
        let past = StockHold {
            reason: "recount".into(),
            until: now - chrono::Duration::minutes(1),
        };
        assert!(r.with_hold(Some(past), now).is_err());

        let future = StockHold {
            reason: "recount".into(),
            until: now + chrono::Duration::hours(1),
        };
        let held = r.with_hold(Some(future), now).unwrap();
        assert!(held.active_hold(now).is_some());
        assert!(held.active_hold(now + chrono::Duration::hours(2)).is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of deltas is attempted, every accepted
        /// state satisfies available = physical - reserved with all three >= 0.
        #[test]
        fn accepted_deltas_preserve_invariants(
            start in 0i64..1_000,
            deltas in prop::collection::vec((-200i64..200, -200i64..200), 1..40)
        ) {
            let mut levels = StockLevels::new(start, 0).unwrap();
            for (dp, dr) in deltas {
                if let Ok(next) = levels.apply(dp, dr) {
                    levels = next;
                }
                prop_assert!(levels.physical() >= 0);
                prop_assert!(levels.reserved() >= 0);
                prop_assert!(levels.available() >= 0);
                prop_assert_eq!(levels.available(), levels.physical() - levels.reserved());
            }
        }

        /// Property: classification severity never decreases as stock drops.
        #[test]
        fn classification_is_monotonic(
            min in 0i64..50,
            extra in 0i64..50,
            a in 0i64..200,
            b in 0i64..200
        ) {
            let t = thresholds(min, min + extra);
            let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
            prop_assert!(classify(lo, &t) >= classify(hi, &t));
        }
    }
}
