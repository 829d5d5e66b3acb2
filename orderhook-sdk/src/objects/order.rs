//! Order objects for the local order API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    /// Price of one unit in the currency's minor unit (cents).
    pub unit_price: i64,
}

/// `POST /api/orders` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Local id; generated when absent.
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub external_order_id: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// `PUT /api/orders/{order_id}/external-id` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkExternalOrderRequest {
    pub external_order_id: String,
}

/// An order as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub external_order_id: Option<String>,
    pub items: Vec<LineItem>,
    pub status: String,
    pub meta: Map<String, Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: time::OffsetDateTime,
}
