use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::ProductId;

use crate::event::Event;

/// Transport wrapper for a published event.
///
/// `ledger_version` is the stock record version the event was emitted
/// against; consumers can use it to drop stale or duplicate deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    product_id: ProductId,
    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,
    ledger_version: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        product_id: ProductId,
        event_type: impl Into<String>,
        event_version: u32,
        occurred_at: DateTime<Utc>,
        ledger_version: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            product_id,
            event_type: event_type.into(),
            event_version,
            occurred_at,
            ledger_version,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn ledger_version(&self) -> u64 {
        self.ledger_version
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Map the payload (e.g. typed event -> JSON) keeping all metadata.
    pub fn map_payload<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            product_id: self.product_id,
            event_type: self.event_type,
            event_version: self.event_version,
            occurred_at: self.occurred_at,
            ledger_version: self.ledger_version,
            payload: f(self.payload),
        }
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, taking metadata from the event itself.
    pub fn wrap(event: E, ledger_version: u64) -> Self {
        Self::new(
            Uuid::now_v7(),
            event.product_id(),
            event.event_type(),
            event.version(),
            event.occurred_at(),
            ledger_version,
            event,
        )
    }
}
