//! Acknowledgement returned to the payment processor.

use serde::{Deserialize, Serialize};

/// What happened to a single event of a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventOutcome {
    Applied,
    Duplicate,
    OrderNotFound,
    Ignored,
    /// The event could not be interpreted and was skipped.
    Malformed,
    /// The ledger could not be written; the delivery should be retried.
    Failed,
}

impl std::fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventOutcome::Applied => write!(f, "APPLIED"),
            EventOutcome::Duplicate => write!(f, "DUPLICATE"),
            EventOutcome::OrderNotFound => write!(f, "ORDER_NOT_FOUND"),
            EventOutcome::Ignored => write!(f, "IGNORED"),
            EventOutcome::Malformed => write!(f, "MALFORMED"),
            EventOutcome::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResult {
    /// `None` when the event was too malformed to carry an id.
    pub event_id: Option<String>,
    pub outcome: EventOutcome,
}

/// `200 {"success": true, "results": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<EventResult>,
}

impl WebhookAck {
    pub fn new(results: Vec<EventResult>) -> Self {
        Self {
            success: true,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_wire_shape() {
        let ack = WebhookAck::new(vec![EventResult {
            event_id: Some("e1".to_string()),
            outcome: EventOutcome::OrderNotFound,
        }]);
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "results": [{"eventId": "e1", "outcome": "ORDER_NOT_FOUND"}]
            })
        );
    }
}
