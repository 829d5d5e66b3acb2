//! JSON objects exchanged over the orderhook HTTP API.

mod order;
mod webhook;

pub use order::{CreateOrderRequest, LineItem, LinkExternalOrderRequest, OrderResponse};
pub use webhook::{EventOutcome, EventResult, WebhookAck};

use serde::{Deserialize, Serialize};

/// Body of every failed request: `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
