//! Stock events and their distribution.
//!
//! Mutations in the inventory core publish facts (reservation created, alert
//! raised, ...) so collaborators such as notification delivery can react
//! without being called synchronously.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, NullEventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
