//! Order API handlers.
//!
//! Called by the application backend to create local orders before a
//! payment starts, and to link them to the processor's order id.
//!
//! # Endpoints
//!
//! - `POST /api/orders`                           – create a new pending order
//! - `GET  /api/orders/{order_id}`                – get an order
//! - `PUT  /api/orders/{order_id}/external-id`    – link the processor's order id

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use orderhook_core::entities::orders::OrderRecord;
use orderhook_core::ledger::{AttachOutcome, LedgerError};
use orderhook_sdk::objects::{
    CreateOrderRequest, ErrorResponse, LinkExternalOrderRequest, OrderResponse,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::AppState;

/// Build the Order API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/{order_id}", get(get_order))
        .route("/api/orders/{order_id}/external-id", put(link_external_order))
}

/// `POST /api/orders`: create a new pending order.
async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, OrderApiError> {
    let Json(payload) = payload.map_err(|e| OrderApiError::BadRequest(e.body_text()))?;
    if payload.items.is_empty() {
        return Err(OrderApiError::BadRequest(
            "order must contain at least one item".to_string(),
        ));
    }

    let order_id = payload
        .order_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("ORD-{}", Uuid::now_v7()));

    let mut record = OrderRecord::new_pending(order_id, payload.items, OffsetDateTime::now_utc());
    record.external_order_id = payload
        .external_order_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    record.meta = payload.meta;

    if !state.ledger.create_order(record.clone()).await? {
        return Err(OrderApiError::Conflict(format!(
            "order {} already exists or its external order id is taken",
            record.order_id
        )));
    }
    tracing::info!(order_id = %record.order_id, "Order created");

    Ok((StatusCode::CREATED, Json(OrderResponse::from(record))))
}

/// `GET /api/orders/{order_id}`: get an existing order.
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, OrderApiError> {
    let record = state
        .ledger
        .get_order(&order_id)
        .await?
        .ok_or(OrderApiError::NotFound)?;
    Ok(Json(record.into()))
}

/// `PUT /api/orders/{order_id}/external-id`: link the processor's order id.
///
/// The link is set once. Repeating it with the same value is a no-op.
async fn link_external_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    payload: Result<Json<LinkExternalOrderRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, OrderApiError> {
    let Json(payload) = payload.map_err(|e| OrderApiError::BadRequest(e.body_text()))?;
    let external_order_id = payload.external_order_id.trim();
    if external_order_id.is_empty() {
        return Err(OrderApiError::BadRequest(
            "externalOrderId must not be empty".to_string(),
        ));
    }

    match state
        .ledger
        .attach_external_order_id(&order_id, external_order_id)
        .await?
    {
        AttachOutcome::Attached | AttachOutcome::Unchanged => {}
        AttachOutcome::AlreadyLinked { existing } => {
            return Err(OrderApiError::Conflict(format!(
                "order {order_id} is already linked to {existing}"
            )));
        }
        AttachOutcome::TakenByOtherOrder { order_id: holder } => {
            return Err(OrderApiError::Conflict(format!(
                "{external_order_id} is already linked to order {holder}"
            )));
        }
        AttachOutcome::NotFound => return Err(OrderApiError::NotFound),
    }

    let record = state
        .ledger
        .get_order(&order_id)
        .await?
        .ok_or(OrderApiError::NotFound)?;
    Ok(Json(record.into()))
}

/// Errors that can occur in Order API handlers.
#[derive(Debug)]
enum OrderApiError {
    BadRequest(String),
    NotFound,
    Conflict(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for OrderApiError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

impl IntoResponse for OrderApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            OrderApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            OrderApiError::NotFound => (StatusCode::NOT_FOUND, "order not found".to_string()),
            OrderApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            OrderApiError::Ledger(e) => {
                tracing::error!(error = %e, "Order API ledger error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
