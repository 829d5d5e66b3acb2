//! PostgreSQL ledger backend.
//!
//! Each operation is a query unit from [`crate::entities`] run through
//! [`DatabaseProcessor`]. Order writes replace the whole row; per-order
//! serialization is provided by [`super::Ledger`].

use super::{LedgerError, LedgerStore};
use crate::entities::orders::{
    GetOrderByExternalId, GetOrderById, InsertOrder, OrderRecord, ReplaceOrder,
};
use crate::entities::processed_events::{
    DeleteProcessedEvent, InsertProcessedEvent, ProcessedEvent, ProcessedEventExists,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;

pub struct PgLedger {
    processor: DatabaseProcessor,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn create_order(&self, record: OrderRecord) -> Result<bool, LedgerError> {
        Ok(self.processor.process(InsertOrder { record }).await?)
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<OrderRecord>, LedgerError> {
        Ok(self
            .processor
            .process(GetOrderById {
                order_id: order_id.to_string(),
            })
            .await?)
    }

    async fn get_order_by_external_id(
        &self,
        external_order_id: &str,
    ) -> Result<Option<OrderRecord>, LedgerError> {
        Ok(self
            .processor
            .process(GetOrderByExternalId {
                external_order_id: external_order_id.to_string(),
            })
            .await?)
    }

    async fn replace_order(&self, record: OrderRecord) -> Result<bool, LedgerError> {
        let external = record.external_order_id.clone();
        match self.processor.process(ReplaceOrder { record }).await {
            Ok(replaced) => Ok(replaced),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                LedgerError::ExternalIdConflict(external.unwrap_or_default()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_event(&self, event: ProcessedEvent) -> Result<bool, LedgerError> {
        Ok(self.processor.process(InsertProcessedEvent { event }).await?)
    }

    async fn has_processed_event(&self, event_id: &str) -> Result<bool, LedgerError> {
        Ok(self
            .processor
            .process(ProcessedEventExists {
                event_id: event_id.to_string(),
            })
            .await?)
    }

    async fn remove_event(&self, event_id: &str) -> Result<(), LedgerError> {
        self.processor
            .process(DeleteProcessedEvent {
                event_id: event_id.to_string(),
            })
            .await?;
        Ok(())
    }
}
