//! ReconciliationEngine.
//!
//! Applies canonical payment events to the order ledger:
//! - Drops redeliveries of an already recorded event id
//! - Records every new event before touching any order
//! - Ignores events that are not payment events or name no order
//! - Maps the processor status onto the local order status, never moving a
//!   terminal order back to a non-terminal status
//!
//! Events carry no sequence number, so ordering is approximated by the
//! terminal-status guard alone. Two non-terminal updates delivered out of
//! order still apply in arrival order.

use crate::entities::OrderStatus;
use crate::entities::orders::OrderRecord;
use crate::events::CanonicalEvent;
use crate::ledger::{Ledger, LedgerError};
use orderhook_sdk::objects::EventOutcome;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Processor statuses that mean the money has been collected.
pub const PAID_STATUSES: &[&str] = &["COMPLETED", "CAPTURED", "PAID", "APPROVED"];

/// What [`ReconciliationEngine::apply`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    Applied {
        order_id: String,
        status: OrderStatus,
        /// `true` when the order was terminal and kept its status.
        status_held: bool,
    },
    Duplicate,
    OrderNotFound,
    Ignored,
}

impl From<&ReconciliationResult> for EventOutcome {
    fn from(result: &ReconciliationResult) -> Self {
        match result {
            ReconciliationResult::Applied { .. } => EventOutcome::Applied,
            ReconciliationResult::Duplicate => EventOutcome::Duplicate,
            ReconciliationResult::OrderNotFound => EventOutcome::OrderNotFound,
            ReconciliationResult::Ignored => EventOutcome::Ignored,
        }
    }
}

/// Status change and meta patch an event asks for.
#[derive(Debug, Clone, PartialEq)]
struct Transition {
    status: OrderStatus,
    meta_patch: Map<String, Value>,
}

impl Transition {
    fn from_event(event: &CanonicalEvent) -> Self {
        let mut meta_patch = Map::new();
        if let Some(payment_id) = &event.external_payment_id {
            meta_patch.insert("paymentId".to_string(), Value::String(payment_id.clone()));
        }

        let raw = event.raw_status.as_str();
        let status = if PAID_STATUSES.contains(&raw) {
            meta_patch.insert("rawStatus".to_string(), Value::String(raw.to_string()));
            OrderStatus::Paid
        } else {
            // Empty maps to PENDING, anything else is kept verbatim.
            OrderStatus::from_raw(raw)
        };

        Self { status, meta_patch }
    }

    /// Apply to `order`. Returns `true` if the status was held back.
    fn apply_to(self, order: &mut OrderRecord) -> bool {
        order.merge_meta(self.meta_patch);
        if order.status.is_terminal() && !self.status.is_terminal() {
            return true;
        }
        order.status = self.status;
        false
    }
}

/// Applies canonical events to a [`Ledger`].
#[derive(Clone)]
pub struct ReconciliationEngine {
    ledger: Ledger,
}

impl ReconciliationEngine {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Apply one event.
    ///
    /// Only ledger failures are errors. When the order write fails after the
    /// event was recorded, the event record is removed again so a redelivery
    /// is processed instead of being dropped as a duplicate.
    #[tracing::instrument(skip_all, fields(event_id = %event.event_id, event_type = %event.event_type))]
    pub async fn apply(
        &self,
        event: &CanonicalEvent,
    ) -> Result<ReconciliationResult, LedgerError> {
        if self.ledger.has_processed_event(&event.event_id).await? {
            debug!("Event already processed");
            return Ok(ReconciliationResult::Duplicate);
        }
        // Insert-if-absent: a concurrent delivery of the same id loses here.
        if !self
            .ledger
            .insert_event(event.to_processed(OffsetDateTime::now_utc()))
            .await?
        {
            debug!("Event recorded concurrently by another delivery");
            return Ok(ReconciliationResult::Duplicate);
        }
        if event.event_id_synthesized {
            debug!("Event carried no id; duplicate detection is best effort");
        }

        match self.apply_to_order(event).await {
            Ok(result) => Ok(result),
            Err(e) => {
                if let Err(cleanup) = self.ledger.remove_event(&event.event_id).await {
                    error!(error = %cleanup, "Failed to un-record event after ledger error");
                }
                Err(e)
            }
        }
    }

    async fn apply_to_order(
        &self,
        event: &CanonicalEvent,
    ) -> Result<ReconciliationResult, LedgerError> {
        if !event.is_payment_event() {
            debug!("Not a payment event, ignoring");
            return Ok(ReconciliationResult::Ignored);
        }
        let Some(external_order_id) = event.external_order_id.as_deref() else {
            info!("Payment event without an order reference, ignoring");
            return Ok(ReconciliationResult::Ignored);
        };

        let Some(order) = self.ledger.get_order_by_external_id(external_order_id).await? else {
            warn!(
                external_order_id = %external_order_id,
                "No local order for payment event"
            );
            return Ok(ReconciliationResult::OrderNotFound);
        };

        let transition = Transition::from_event(event);
        let requested = transition.status.clone();
        let outcome = self
            .ledger
            .mutate_order(&order.order_id, move |record| {
                let held = transition.apply_to(record);
                (record.status.clone(), held)
            })
            .await?;

        let Some((status, status_held)) = outcome else {
            warn!(order_id = %order.order_id, "Order disappeared during reconciliation");
            return Ok(ReconciliationResult::OrderNotFound);
        };

        if status_held {
            warn!(
                order_id = %order.order_id,
                current = %status,
                requested = %requested,
                "Possible out-of-order delivery; keeping terminal status"
            );
        } else {
            info!(
                order_id = %order.order_id,
                status = %status,
                payment_id = event.external_payment_id.as_deref().unwrap_or(""),
                "Order status reconciled"
            );
        }

        Ok(ReconciliationResult::Applied {
            order_id: order.order_id,
            status,
            status_held,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::normalize;
    use crate::ledger::MemoryLedger;
    use serde_json::json;
    use std::sync::Arc;

    fn engine_with(orders: &[OrderRecord]) -> (ReconciliationEngine, Arc<MemoryLedger>) {
        let store = Arc::new(MemoryLedger::new());
        for order in orders {
            store.insert_unchecked(order.clone());
        }
        (
            ReconciliationEngine::new(Ledger::new(store.clone())),
            store,
        )
    }

    fn pending(id: &str) -> OrderRecord {
        OrderRecord::new_pending(id.to_string(), vec![], OffsetDateTime::UNIX_EPOCH)
    }

    fn payment_event(id: &str, order_id: &str, status: &str, payment_id: &str) -> CanonicalEvent {
        normalize(&json!({
            "id": id,
            "type": "payment.updated",
            "data": {"payment": {"order_id": order_id, "status": status, "id": payment_id}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_completed_payment_marks_order_paid() {
        let (engine, _) = engine_with(&[pending("ORD-1")]);
        let event = payment_event("e1", "ORD-1", "COMPLETED", "pay-1");

        let result = engine.apply(&event).await.unwrap();
        assert_eq!(
            result,
            ReconciliationResult::Applied {
                order_id: "ORD-1".to_string(),
                status: OrderStatus::Paid,
                status_held: false,
            }
        );

        let order = engine.ledger().get_order("ORD-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.meta["paymentId"], json!("pay-1"));
        assert_eq!(order.meta["rawStatus"], json!("COMPLETED"));
    }

    #[tokio::test]
    async fn test_replay_is_duplicate_and_mutates_once() {
        let (engine, _) = engine_with(&[pending("ORD-1")]);
        let event = payment_event("e1", "ORD-1", "COMPLETED", "pay-1");

        assert!(matches!(
            engine.apply(&event).await.unwrap(),
            ReconciliationResult::Applied { .. }
        ));
        let after_first = engine.ledger().get_order("ORD-1").await.unwrap().unwrap();

        assert_eq!(
            engine.apply(&event).await.unwrap(),
            ReconciliationResult::Duplicate
        );
        let after_second = engine.ledger().get_order("ORD-1").await.unwrap().unwrap();
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_apply_once() {
        let (engine, store) = engine_with(&[pending("ORD-1")]);
        let event = payment_event("e1", "ORD-1", "COMPLETED", "pay-1");

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let event = event.clone();
            tasks.push(tokio::spawn(async move { engine.apply(&event).await.unwrap() }));
        }
        let mut applied = 0;
        for task in tasks {
            if matches!(task.await.unwrap(), ReconciliationResult::Applied { .. }) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(store.event_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_order_is_recorded_but_not_found() {
        let (engine, store) = engine_with(&[pending("ORD-1")]);
        let event = payment_event("e2", "ORD-404", "COMPLETED", "pay-2");

        assert_eq!(
            engine.apply(&event).await.unwrap(),
            ReconciliationResult::OrderNotFound
        );
        assert!(store.get_event("e2").is_some());
    }

    #[tokio::test]
    async fn test_terminal_status_is_not_regressed() {
        let mut paid = pending("ORD-1");
        paid.status = OrderStatus::Paid;
        paid.meta.insert("paymentId".into(), json!("pay-1"));
        let (engine, _) = engine_with(&[paid]);

        // A stale payment.created arriving after completion.
        let mut stale = payment_event("e0", "ORD-1", "APPROVED_PENDING", "pay-1b");
        stale.event_type = "payment.created".to_string();

        let result = engine.apply(&stale).await.unwrap();
        assert_eq!(
            result,
            ReconciliationResult::Applied {
                order_id: "ORD-1".to_string(),
                status: OrderStatus::Paid,
                status_held: true,
            }
        );
        let order = engine.ledger().get_order("ORD-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.meta["paymentId"], json!("pay-1b"));
    }

    #[tokio::test]
    async fn test_terminal_to_terminal_is_applied() {
        let mut paid = pending("ORD-1");
        paid.status = OrderStatus::Paid;
        let (engine, _) = engine_with(&[paid]);

        let event = payment_event("e9", "ORD-1", "CANCELED", "pay-1");
        engine.apply(&event).await.unwrap();
        let order = engine.ledger().get_order("ORD-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert!(!order.meta.contains_key("rawStatus"));
    }

    #[tokio::test]
    async fn test_non_paid_status_is_kept_verbatim() {
        let (engine, _) = engine_with(&[pending("ORD-1"), pending("ORD-2")]);

        engine
            .apply(&payment_event("e1", "ORD-1", "failed", "pay-1"))
            .await
            .unwrap();
        let order = engine.ledger().get_order("ORD-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Other("FAILED".to_string()));
        assert_eq!(order.meta["paymentId"], json!("pay-1"));

        let no_status = normalize(&json!({
            "id": "e2",
            "type": "payment.created",
            "data": {"payment": {"order_id": "ORD-2"}}
        }))
        .unwrap();
        engine.apply(&no_status).await.unwrap();
        let order = engine.ledger().get_order("ORD-2").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(!order.meta.contains_key("paymentId"));
    }

    #[tokio::test]
    async fn test_non_payment_event_is_ignored_but_recorded() {
        let (engine, store) = engine_with(&[pending("ORD-1")]);
        let event = normalize(&json!({
            "id": "e3",
            "type": "catalog.updated",
            "data": {"payment": {"order_id": "ORD-1", "status": "COMPLETED"}}
        }))
        .unwrap();

        assert_eq!(
            engine.apply(&event).await.unwrap(),
            ReconciliationResult::Ignored
        );
        assert!(store.get_event("e3").is_some());
        let order = engine.ledger().get_order("ORD-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_payment_event_without_order_is_ignored() {
        let (engine, _) = engine_with(&[]);
        let event = normalize(&json!({
            "id": "e4",
            "type": "payment.updated",
            "data": {"amount": 100}
        }))
        .unwrap();
        assert_eq!(
            engine.apply(&event).await.unwrap(),
            ReconciliationResult::Ignored
        );
    }

    #[tokio::test]
    async fn test_failed_order_write_unrecords_event() {
        let (engine, store) = engine_with(&[pending("ORD-1")]);
        let event = payment_event("e5", "ORD-1", "COMPLETED", "pay-5");

        store.set_fail_order_writes(true);
        assert!(engine.apply(&event).await.is_err());
        assert!(store.get_event("e5").is_none());

        store.set_fail_order_writes(false);
        assert!(matches!(
            engine.apply(&event).await.unwrap(),
            ReconciliationResult::Applied { .. }
        ));
    }

    #[tokio::test]
    async fn test_unavailable_ledger_is_an_error() {
        let (engine, store) = engine_with(&[pending("ORD-1")]);
        store.set_unavailable(true);
        let event = payment_event("e6", "ORD-1", "COMPLETED", "pay-6");
        assert!(matches!(
            engine.apply(&event).await,
            Err(LedgerError::Unavailable(_))
        ));
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            EventOutcome::from(&ReconciliationResult::Duplicate),
            EventOutcome::Duplicate
        );
        assert_eq!(
            EventOutcome::from(&ReconciliationResult::OrderNotFound),
            EventOutcome::OrderNotFound
        );
    }
}
