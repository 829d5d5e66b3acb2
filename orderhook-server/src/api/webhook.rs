//! Payment processor webhook endpoint.
//!
//! A delivery moves through verify -> normalize -> reconcile -> acknowledge.
//! Verification happens in [`VerifiedWebhook`]; by the time the handler runs,
//! the body is authentic. From there every delivery is acknowledged with 200
//! unless the ledger itself failed, because the processor retrying cannot fix
//! a malformed payload or an unknown order.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use orderhook_core::events::normalize;
use orderhook_sdk::objects::{ErrorResponse, EventOutcome, EventResult, WebhookAck};
use serde_json::Value;

use crate::api::extractors::VerifiedWebhook;
use crate::state::AppState;

/// `POST {webhook path}`: receive one event or a batch of events.
pub async fn receive_webhook(
    State(state): State<AppState>,
    VerifiedWebhook { body, signed_form }: VerifiedWebhook,
) -> Result<Json<WebhookAck>, WebhookError> {
    tracing::debug!(
        body_len = body.len(),
        signed = signed_form.is_some(),
        "Webhook delivery received"
    );
    let events = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Array(events)) => events,
        Ok(event @ Value::Object(_)) => vec![event],
        Ok(_) => {
            tracing::warn!("Webhook body is neither an event nor a batch, acknowledging");
            return Ok(Json(WebhookAck::new(Vec::new())));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Webhook body is not valid JSON, acknowledging");
            return Ok(Json(WebhookAck::new(Vec::new())));
        }
    };

    let mut results = Vec::with_capacity(events.len());
    let mut ledger_failed = false;

    // Events are independent: one failing must not stop the rest.
    for raw in &events {
        let event = match normalize(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed webhook event");
                results.push(EventResult {
                    event_id: None,
                    outcome: EventOutcome::Malformed,
                });
                continue;
            }
        };

        let outcome = match state.engine.apply(&event).await {
            Ok(result) => EventOutcome::from(&result),
            Err(e) => {
                tracing::error!(
                    event_id = %event.event_id,
                    error = %e,
                    "Ledger failure while reconciling webhook event"
                );
                ledger_failed = true;
                EventOutcome::Failed
            }
        };
        results.push(EventResult {
            event_id: Some(event.event_id),
            outcome,
        });
    }

    if ledger_failed {
        return Err(WebhookError::Ledger);
    }
    Ok(Json(WebhookAck::new(results)))
}

/// Errors that turn an authentic delivery into a non-200 response.
#[derive(Debug)]
pub enum WebhookError {
    /// At least one event could not be recorded; the processor should retry.
    Ledger,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::Ledger => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("ledger unavailable, retry delivery")),
            )
                .into_response(),
        }
    }
}
