//! Service wiring for the HTTP surface.
//!
//! In-memory stores behind the `Stores` seams, the wall clock, and an
//! in-memory event bus whose events are handed to the notification relay.

use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use stockledger_core::{Clock, SystemClock};
use stockledger_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use stockledger_infra::engine::Stores;
use stockledger_infra::notify::Notifier;
use stockledger_infra::store::InMemoryCatalog;
use stockledger_infra::{InventoryConfig, InventoryEngine};

pub type JsonEvent = EventEnvelope<serde_json::Value>;

#[derive(Clone)]
pub struct AppServices {
    pub engine: InventoryEngine,
    pub catalog: Arc<InMemoryCatalog>,
    pub bus: Arc<InMemoryEventBus<JsonEvent>>,
}

/// Services configured from the `STOCK_*` environment.
pub fn build_services() -> AppServices {
    build_services_with(InventoryConfig::from_env(), Arc::new(SystemClock))
}

pub fn build_services_with(config: InventoryConfig, clock: Arc<dyn Clock>) -> AppServices {
    let catalog = Arc::new(InMemoryCatalog::new());
    let bus: Arc<InMemoryEventBus<JsonEvent>> = Arc::new(InMemoryEventBus::new());

    spawn_notification_relay(bus.subscribe());

    let engine = InventoryEngine::new(
        Stores::in_memory_with_catalog(catalog.clone()),
        config,
        clock,
        Notifier::new(bus.clone()),
    );

    AppServices { engine, catalog, bus }
}

/// Hand committed stock events to notification delivery.
///
/// Delivery itself lives outside this service; the relay logs each event so
/// downstream shippers can pick them up from the structured log stream.
fn spawn_notification_relay(subscription: Subscription<JsonEvent>) {
    let spawned = thread::Builder::new()
        .name("notification-relay".to_string())
        .spawn(move || {
            while let Ok(event) = subscription.recv() {
                match event.event_type() {
                    "inventory.alert.raised" | "inventory.alert.escalated" => info!(
                        event_type = event.event_type(),
                        product_id = %event.product_id(),
                        ledger_version = event.ledger_version(),
                        payload = %event.payload(),
                        "reorder notification queued"
                    ),
                    other => debug!(
                        event_type = other,
                        product_id = %event.product_id(),
                        ledger_version = event.ledger_version(),
                        "stock event relayed"
                    ),
                }
            }
            debug!("notification relay stopped");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "notification relay not started; events will only be published");
    }
}
