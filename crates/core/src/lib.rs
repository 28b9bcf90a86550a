//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the error taxonomy shared by every stock
//! operation, optimistic-concurrency version expectations and a clock seam.

pub mod clock;
pub mod error;
pub mod id;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{AdjustmentId, AlertId, AuditEntryId, OrderId, ProductId, ReservationId, UserId};
pub use version::{ExpectedVersion, Versioned};
