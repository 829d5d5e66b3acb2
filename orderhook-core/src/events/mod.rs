//! Inbound payment-processor events.
//!
//! Raw webhook JSON arrives in several shapes depending on the event type and
//! API version. [`normalize`] reduces each one to a [`CanonicalEvent`] that
//! the reconciliation engine consumes without caring about the wire shape.

pub mod normalize;
pub mod types;

pub use normalize::{NormalizationError, PAYMENT_EVENT_PREFIX, normalize};
pub use types::CanonicalEvent;
