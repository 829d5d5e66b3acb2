//! Canonical event representation.

use crate::entities::processed_events::ProcessedEvent;
use serde_json::Value;
use time::OffsetDateTime;

/// A webhook event reduced to the fields reconciliation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    pub event_id: String,
    /// `true` when the processor sent no id and one was generated locally.
    /// Such ids give no protection against redelivery.
    pub event_id_synthesized: bool,
    pub event_type: String,
    pub external_order_id: Option<String>,
    pub external_payment_id: Option<String>,
    /// Upper-cased status of the payment, empty if none was found.
    pub raw_status: String,
    /// The event exactly as received.
    pub payload: Value,
}

impl CanonicalEvent {
    pub fn is_payment_event(&self) -> bool {
        self.event_type.starts_with(super::PAYMENT_EVENT_PREFIX)
    }

    /// The audit row recorded for this event.
    pub fn to_processed(&self, received_at: OffsetDateTime) -> ProcessedEvent {
        ProcessedEvent {
            event_id: self.event_id.clone(),
            event_type: self.event_type.clone(),
            payload: self.payload.clone(),
            received_at,
        }
    }
}
