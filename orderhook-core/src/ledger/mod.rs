//! The order ledger.
//!
//! [`LedgerStore`] is the persistence boundary: plain reads, inserts and
//! whole-row replaces. [`Ledger`] wraps a store and adds the read-modify-write
//! operations, each run under a per-order lock so that overlapping webhook
//! deliveries for one order cannot lose each other's updates.

mod locks;
pub mod memory;
pub mod postgres;

pub use locks::{DEFAULT_STRIPES, KeyedLocks};
pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use crate::entities::OrderStatus;
use crate::entities::orders::OrderRecord;
use crate::entities::processed_events::ProcessedEvent;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

/// Errors raised by a ledger backend.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The external order id is linked to a different order.
    #[error("external order id {0} is already linked to another order")]
    ExternalIdConflict(String),

    /// The backend refused the operation.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations a ledger backend provides.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a new order. `false` if the order id or external id is taken.
    async fn create_order(&self, record: OrderRecord) -> Result<bool, LedgerError>;

    async fn get_order(&self, order_id: &str) -> Result<Option<OrderRecord>, LedgerError>;

    /// Look up through the external-id index only.
    async fn get_order_by_external_id(
        &self,
        external_order_id: &str,
    ) -> Result<Option<OrderRecord>, LedgerError>;

    /// Replace an existing row as a whole. `false` if the order does not exist.
    async fn replace_order(&self, record: OrderRecord) -> Result<bool, LedgerError>;

    /// Insert-if-absent. `false` if the event id was already recorded.
    async fn insert_event(&self, event: ProcessedEvent) -> Result<bool, LedgerError>;

    async fn has_processed_event(&self, event_id: &str) -> Result<bool, LedgerError>;

    async fn remove_event(&self, event_id: &str) -> Result<(), LedgerError>;
}

/// Result of linking a processor order id to a local order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    /// The order already carries this external id.
    Unchanged,
    /// The order is linked to a different external id, which is never overwritten.
    AlreadyLinked { existing: String },
    /// Another local order already carries this external id.
    TakenByOtherOrder { order_id: String },
    NotFound,
}

/// A ledger store plus per-order write serialization.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    locks: Arc<KeyedLocks>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            locks: Arc::new(KeyedLocks::default()),
        }
    }

    pub async fn create_order(&self, record: OrderRecord) -> Result<bool, LedgerError> {
        self.store.create_order(record).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Option<OrderRecord>, LedgerError> {
        self.store.get_order(order_id).await
    }

    /// Find the order a processor id refers to.
    ///
    /// The external-id index is consulted first. When nothing is linked, an
    /// order whose local id equals the processor id is returned instead, which
    /// covers orders created under the processor-assigned id.
    pub async fn get_order_by_external_id(
        &self,
        external_order_id: &str,
    ) -> Result<Option<OrderRecord>, LedgerError> {
        if let Some(order) = self.store.get_order_by_external_id(external_order_id).await? {
            return Ok(Some(order));
        }
        match self.store.get_order(external_order_id).await? {
            // An order linked elsewhere is not a match for this id.
            Some(order)
                if order
                    .external_order_id
                    .as_deref()
                    .is_none_or(|linked| linked == external_order_id) =>
            {
                Ok(Some(order))
            }
            _ => Ok(None),
        }
    }

    /// Run `f` on the current state of an order and persist the result.
    ///
    /// The read, `f`, and the write happen under the order's lock; `updated_at`
    /// is bumped. Returns `None` if the order does not exist.
    pub async fn mutate_order<F, R>(&self, order_id: &str, f: F) -> Result<Option<R>, LedgerError>
    where
        F: FnOnce(&mut OrderRecord) -> R + Send,
        R: Send,
    {
        let _guard = self.locks.lock(order_id).await;
        let Some(mut record) = self.store.get_order(order_id).await? else {
            return Ok(None);
        };
        let output = f(&mut record);
        record.updated_at = OffsetDateTime::now_utc();
        if !self.store.replace_order(record).await? {
            return Ok(None);
        }
        Ok(Some(output))
    }

    /// Set the status and shallow-merge `meta_patch` into `meta`.
    ///
    /// Returns whether the order was found.
    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        meta_patch: Map<String, Value>,
    ) -> Result<bool, LedgerError> {
        let updated = self
            .mutate_order(order_id, move |record| {
                record.status = status;
                record.merge_meta(meta_patch);
            })
            .await?;
        Ok(updated.is_some())
    }

    /// Link a processor order id to a local order. Set once, never overwritten.
    pub async fn attach_external_order_id(
        &self,
        order_id: &str,
        external_order_id: &str,
    ) -> Result<AttachOutcome, LedgerError> {
        let _guard = self.locks.lock(order_id).await;
        let Some(mut record) = self.store.get_order(order_id).await? else {
            return Ok(AttachOutcome::NotFound);
        };
        match record.external_order_id.as_deref() {
            Some(existing) if existing == external_order_id => return Ok(AttachOutcome::Unchanged),
            Some(existing) => {
                warn!(
                    order_id = %order_id,
                    existing = %existing,
                    requested = %external_order_id,
                    "Refusing to overwrite external order id"
                );
                return Ok(AttachOutcome::AlreadyLinked {
                    existing: existing.to_string(),
                });
            }
            None => {}
        }
        if let Some(other) = self.store.get_order_by_external_id(external_order_id).await? {
            return Ok(AttachOutcome::TakenByOtherOrder {
                order_id: other.order_id,
            });
        }

        record.external_order_id = Some(external_order_id.to_string());
        record.updated_at = OffsetDateTime::now_utc();
        match self.store.replace_order(record).await {
            Ok(true) => Ok(AttachOutcome::Attached),
            Ok(false) => Ok(AttachOutcome::NotFound),
            // Lost a race against another order claiming the same id.
            Err(LedgerError::ExternalIdConflict(_)) => {
                let holder = self
                    .store
                    .get_order_by_external_id(external_order_id)
                    .await?
                    .map(|o| o.order_id)
                    .unwrap_or_default();
                Ok(AttachOutcome::TakenByOtherOrder { order_id: holder })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn insert_event(&self, event: ProcessedEvent) -> Result<bool, LedgerError> {
        self.store.insert_event(event).await
    }

    pub async fn has_processed_event(&self, event_id: &str) -> Result<bool, LedgerError> {
        self.store.has_processed_event(event_id).await
    }

    pub async fn remove_event(&self, event_id: &str) -> Result<(), LedgerError> {
        self.store.remove_event(event_id).await
    }
}
