use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use serde_json::Value;
use sqlx::types::Json;
use time::OffsetDateTime;

/// A webhook event that has been taken into processing.
///
/// The raw payload is kept for audit and debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub event_type: String,
    pub payload: Value,
    pub received_at: OffsetDateTime,
}

/// Record an event unless its id is already present.
///
/// Returns `true` when the row was inserted, `false` for a duplicate id.
#[derive(Debug, Clone)]
pub struct InsertProcessedEvent {
    pub event: ProcessedEvent,
}

impl Processor<InsertProcessedEvent> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertProcessedEvent")]
    async fn process(&self, insert: InsertProcessedEvent) -> Result<bool, sqlx::Error> {
        let event = insert.event;
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_type, payload, received_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event.event_id)
        .bind(event.event_type)
        .bind(Json(event.payload))
        .bind(event.received_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedEventExists {
    pub event_id: String,
}

impl Processor<ProcessedEventExists> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ProcessedEventExists")]
    async fn process(&self, query: ProcessedEventExists) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_events WHERE event_id = $1)",
        )
        .bind(query.event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[derive(Debug, Clone)]
pub struct DeleteProcessedEvent {
    pub event_id: String,
}

impl Processor<DeleteProcessedEvent> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteProcessedEvent")]
    async fn process(&self, delete: DeleteProcessedEvent) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM processed_events WHERE event_id = $1")
            .bind(delete.event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
