//! Processors that turn inbound events into ledger changes.
//!
//! - `ReconciliationEngine`: receives a `CanonicalEvent`, updates the order it names

pub mod reconciliation;

pub use reconciliation::{PAID_STATUSES, ReconciliationEngine, ReconciliationResult};
