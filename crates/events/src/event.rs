use chrono::{DateTime, Utc};

use stockledger_core::ProductId;

/// A domain fact about stock.
///
/// Events are immutable, versioned for schema evolution, and always scoped to
/// the product whose stock record they describe.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "inventory.reservation.created").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Product whose stock the event concerns.
    fn product_id(&self) -> ProductId;
}
