//! Best-effort publication of committed stock events.

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use stockledger_events::{EventBus, EventEnvelope, NullEventBus};
use stockledger_inventory::InventoryEvent;

type PublishFn = dyn Fn(EventEnvelope<JsonValue>) -> Result<(), String> + Send + Sync;

/// Publishes inventory events, as JSON envelopes, on whichever bus was wired in.
///
/// A failed publish is logged and swallowed; the stock change that produced
/// the event has already been committed.
#[derive(Clone)]
pub struct Notifier {
    publish: Arc<PublishFn>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(NullEventBus)
    }
}

impl Notifier {
    pub fn new<B>(bus: B) -> Self
    where
        B: EventBus<EventEnvelope<JsonValue>> + 'static,
    {
        Self {
            publish: Arc::new(move |envelope| bus.publish(envelope).map_err(|e| format!("{e:?}"))),
        }
    }

    pub fn publish(&self, event: InventoryEvent, ledger_version: u64) {
        let envelope = EventEnvelope::wrap(event, ledger_version);
        let event_type = envelope.event_type().to_string();

        let payload = match serde_json::to_value(envelope.payload()) {
            Ok(v) => v,
            Err(e) => {
                warn!(event_type = %event_type, error = %e, "failed to serialize inventory event");
                return;
            }
        };

        if let Err(error) = (self.publish)(envelope.map_payload(|_| payload)) {
            warn!(event_type = %event_type, %error, "failed to publish inventory event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_core::ProductId;
    use stockledger_events::InMemoryEventBus;

    #[test]
    fn publishes_json_envelope_with_ledger_version() {
        let bus = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let notifier = Notifier::new(bus.clone());
        let product_id = ProductId::new();

        notifier.publish(
            InventoryEvent::StockRegistered {
                product_id,
                sku: "SKU-9".to_string(),
                physical_stock: 4,
                occurred_at: Utc::now(),
            },
            1,
        );

        let envelope = sub.try_recv().unwrap();
        assert_eq!(envelope.event_type(), "inventory.stock.registered");
        assert_eq!(envelope.product_id(), product_id);
        assert_eq!(envelope.ledger_version(), 1);
        assert_eq!(envelope.payload()["kind"], "stock_registered");
        assert_eq!(envelope.payload()["physical_stock"], 4);
    }
}
