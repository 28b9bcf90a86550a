//! Process-wide tracing setup shared by the stock ledger binaries.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use tracing::{DEFAULT_FILTER, init_with_default};

/// Install the JSON subscriber with the default filter.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with_default(DEFAULT_FILTER);
}
