//! Raw webhook JSON -> [`CanonicalEvent`].
//!
//! Each concept has a short ordered list of extractor functions. They are
//! tried in priority order and the first `Some` wins.

use super::types::CanonicalEvent;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Event types starting with this prefix are payment notifications.
pub const PAYMENT_EVENT_PREFIX: &str = "payment";

const UNKNOWN_EVENT_TYPE: &str = "unknown";

type Object = Map<String, Value>;
type PaymentLocator = fn(&Object) -> Option<&Object>;
type FieldExtractor = fn(&Object) -> Option<String>;

/// Where the payment record may sit inside an event, most specific first.
const PAYMENT_LOCATORS: &[PaymentLocator] = &[data_object_payment, data_payment, data_itself];

/// Field-name aliases for the processor's order id.
const ORDER_ID_EXTRACTORS: &[FieldExtractor] =
    &[snake_order_id, camel_order_id, first_of_order_ids, nested_order_id];

const STATUS_EXTRACTORS: &[FieldExtractor] = &[status_field, state_field];

#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("event is not a JSON object")]
    NotAnObject,
}

/// Reduce one raw event to its canonical form.
///
/// Only a non-object event is an error. A missing type becomes `"unknown"`,
/// a missing id is synthesized, and a missing payment record leaves the order
/// and payment fields empty.
pub fn normalize(raw: &Value) -> Result<CanonicalEvent, NormalizationError> {
    let event = raw.as_object().ok_or(NormalizationError::NotAnObject)?;

    let (event_id, event_id_synthesized) = match event.get("id").and_then(id_string) {
        Some(id) => (id, false),
        None => (synthesize_event_id(), true),
    };

    let event_type = field_str(event, "type").unwrap_or_else(|| UNKNOWN_EVENT_TYPE.to_string());

    let payment = locate_payment(event);
    let external_order_id = payment.and_then(|p| first_match(p, ORDER_ID_EXTRACTORS));
    let external_payment_id = payment.and_then(|p| p.get("id").and_then(id_string));
    let raw_status = payment
        .and_then(|p| first_match(p, STATUS_EXTRACTORS))
        .map(|s| s.trim().to_ascii_uppercase())
        .unwrap_or_default();

    Ok(CanonicalEvent {
        event_id,
        event_id_synthesized,
        event_type,
        external_order_id,
        external_payment_id,
        raw_status,
        payload: raw.clone(),
    })
}

/// Generate an id for an event the processor sent without one.
///
/// Time-ordered and random, so it never collides with another delivery. That
/// also means a redelivery of the same id-less event gets a new id: this is a
/// best-effort label, not a dedup key.
fn synthesize_event_id() -> String {
    format!("evt_{}", Uuid::now_v7().simple())
}

/// The first candidate that carries a status wins. Failing that, the first
/// candidate that at least references an order.
fn locate_payment(event: &Object) -> Option<&Object> {
    let candidates: Vec<&Object> = PAYMENT_LOCATORS
        .iter()
        .filter_map(|locate| locate(event))
        .collect();
    candidates
        .iter()
        .find(|c| first_match(c, STATUS_EXTRACTORS).is_some())
        .or_else(|| {
            candidates
                .iter()
                .find(|c| first_match(c, ORDER_ID_EXTRACTORS).is_some())
        })
        .copied()
}

fn data_object_payment(event: &Object) -> Option<&Object> {
    event
        .get("data")?
        .get("object")?
        .get("payment")?
        .as_object()
}

fn data_payment(event: &Object) -> Option<&Object> {
    event.get("data")?.get("payment")?.as_object()
}

fn data_itself(event: &Object) -> Option<&Object> {
    event.get("data")?.as_object()
}

fn snake_order_id(payment: &Object) -> Option<String> {
    field_str(payment, "order_id")
}

fn camel_order_id(payment: &Object) -> Option<String> {
    field_str(payment, "orderId")
}

fn first_of_order_ids(payment: &Object) -> Option<String> {
    payment
        .get("order_ids")
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(id_string)
}

fn nested_order_id(payment: &Object) -> Option<String> {
    payment
        .get("order")
        .and_then(Value::as_object)
        .and_then(|order| order.get("id"))
        .and_then(id_string)
}

fn status_field(payment: &Object) -> Option<String> {
    field_str(payment, "status")
}

fn state_field(payment: &Object) -> Option<String> {
    field_str(payment, "state")
}

fn first_match(object: &Object, extractors: &[FieldExtractor]) -> Option<String> {
    extractors.iter().find_map(|extract| extract(object))
}

fn field_str(object: &Object, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).and_then(non_empty)
}

/// Ids are normally strings, but a numeric id is accepted as well.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_square_style_payment_updated() {
        let raw = json!({
            "merchant_id": "M1",
            "type": "payment.updated",
            "event_id": "ignored",
            "id": "evt-123",
            "data": {
                "type": "payment",
                "id": "pay-1",
                "object": {
                    "payment": {
                        "id": "pay-1",
                        "order_id": "sq-order-1",
                        "status": "completed"
                    }
                }
            }
        });
        let event = normalize(&raw).unwrap();
        assert_eq!(event.event_id, "evt-123");
        assert!(!event.event_id_synthesized);
        assert_eq!(event.event_type, "payment.updated");
        assert_eq!(event.external_order_id.as_deref(), Some("sq-order-1"));
        assert_eq!(event.external_payment_id.as_deref(), Some("pay-1"));
        assert_eq!(event.raw_status, "COMPLETED");
        assert!(event.is_payment_event());
        assert_eq!(event.payload, raw);
    }

    #[test]
    fn test_data_payment_shape() {
        let raw = json!({
            "id": "e1",
            "type": "payment.updated",
            "data": {"payment": {"order_id": "ORD-1", "status": "COMPLETED", "id": "pay-1"}}
        });
        let event = normalize(&raw).unwrap();
        assert_eq!(event.external_order_id.as_deref(), Some("ORD-1"));
        assert_eq!(event.external_payment_id.as_deref(), Some("pay-1"));
        assert_eq!(event.raw_status, "COMPLETED");
    }

    #[test]
    fn test_flat_data_shape_with_camel_case() {
        let raw = json!({
            "id": "e2",
            "type": "payment.created",
            "data": {"id": "pay-2", "orderId": "ORD-2", "status": "approved"}
        });
        let event = normalize(&raw).unwrap();
        assert_eq!(event.external_order_id.as_deref(), Some("ORD-2"));
        assert_eq!(event.raw_status, "APPROVED");
    }

    #[test]
    fn test_order_id_alias_priority() {
        let raw = json!({
            "id": "e3",
            "type": "payment.updated",
            "data": {"payment": {
                "status": "PENDING",
                "order": {"id": "nested"},
                "order_ids": ["from-array", "second"],
                "orderId": "camel"
            }}
        });
        assert_eq!(
            normalize(&raw).unwrap().external_order_id.as_deref(),
            Some("camel")
        );

        let raw = json!({
            "id": "e4",
            "type": "payment.updated",
            "data": {"payment": {"status": "PENDING", "order": {"id": "nested"}, "order_ids": ["from-array"]}}
        });
        assert_eq!(
            normalize(&raw).unwrap().external_order_id.as_deref(),
            Some("from-array")
        );

        let raw = json!({
            "id": "e5",
            "type": "payment.updated",
            "data": {"payment": {"status": "PENDING", "order_id": null, "order": {"id": "nested"}}}
        });
        assert_eq!(
            normalize(&raw).unwrap().external_order_id.as_deref(),
            Some("nested")
        );
    }

    #[test]
    fn test_prefers_candidate_with_status() {
        // data.object.payment exists but has no status; data.payment does.
        let raw = json!({
            "id": "e6",
            "type": "payment.updated",
            "data": {
                "object": {"payment": {"note": "partial"}},
                "payment": {"order_id": "ORD-6", "status": "CAPTURED", "id": "pay-6"}
            }
        });
        let event = normalize(&raw).unwrap();
        assert_eq!(event.external_order_id.as_deref(), Some("ORD-6"));
        assert_eq!(event.raw_status, "CAPTURED");
    }

    #[test]
    fn test_missing_id_type_and_payment() {
        let raw = json!({"data": {"amount": 123}});
        let event = normalize(&raw).unwrap();
        assert!(event.event_id_synthesized);
        assert!(event.event_id.starts_with("evt_"));
        assert_eq!(event.event_type, "unknown");
        assert_eq!(event.external_order_id, None);
        assert_eq!(event.raw_status, "");

        let other = normalize(&raw).unwrap();
        assert_ne!(event.event_id, other.event_id);
    }

    #[test]
    fn test_numeric_ids_are_accepted() {
        let raw = json!({
            "id": 42,
            "type": "payment.updated",
            "data": {"payment": {"id": 7, "order_ids": [99], "status": "PAID"}}
        });
        let event = normalize(&raw).unwrap();
        assert_eq!(event.event_id, "42");
        assert_eq!(event.external_payment_id.as_deref(), Some("7"));
        assert_eq!(event.external_order_id.as_deref(), Some("99"));
    }

    #[test]
    fn test_non_object_is_an_error() {
        assert!(matches!(
            normalize(&json!("payment.updated")),
            Err(NormalizationError::NotAnObject)
        ));
        assert!(normalize(&json!([1, 2])).is_err());
    }
}
