use crate::entities::OrderStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use orderhook_sdk::objects::{LineItem, OrderResponse};
use serde_json::{Map, Value};
use sqlx::types::Json;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: String,
    pub external_order_id: Option<String>,
    pub items: Vec<LineItem>,
    pub status: OrderStatus,
    pub meta: Map<String, Value>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl OrderRecord {
    /// A fresh `PENDING` order.
    pub fn new_pending(order_id: String, items: Vec<LineItem>, now: OffsetDateTime) -> Self {
        Self {
            order_id,
            external_order_id: None,
            items,
            status: OrderStatus::Pending,
            meta: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Shallow-merge `patch` into `meta`: new keys are added, existing keys overwritten.
    pub fn merge_meta(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            self.meta.insert(key, value);
        }
    }
}

impl From<OrderRecord> for OrderResponse {
    fn from(record: OrderRecord) -> Self {
        OrderResponse {
            order_id: record.order_id,
            external_order_id: record.external_order_id,
            items: record.items,
            status: record.status.to_string(),
            meta: record.meta,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Row shape of the `orders` table.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    external_order_id: Option<String>,
    items: Json<Vec<LineItem>>,
    status: String,
    meta: Json<Map<String, Value>>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<OrderRow> for OrderRecord {
    fn from(row: OrderRow) -> Self {
        OrderRecord {
            order_id: row.order_id,
            external_order_id: row.external_order_id,
            items: row.items.0,
            status: OrderStatus::from_raw(&row.status),
            meta: row.meta.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_ORDER: &str = r#"
    SELECT order_id, external_order_id, items, status, meta, created_at, updated_at
    FROM orders
"#;

#[derive(Debug, Clone)]
pub struct GetOrderById {
    pub order_id: String,
}

impl Processor<GetOrderById> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderById")]
    async fn process(&self, query: GetOrderById) -> Result<Option<OrderRecord>, sqlx::Error> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE order_id = $1"))
            .bind(query.order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(OrderRecord::from))
    }
}

#[derive(Debug, Clone)]
pub struct GetOrderByExternalId {
    pub external_order_id: String,
}

impl Processor<GetOrderByExternalId> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderByExternalId")]
    async fn process(
        &self,
        query: GetOrderByExternalId,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE external_order_id = $1"
        ))
        .bind(query.external_order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(OrderRecord::from))
    }
}

/// Insert a new order. Returns `false` when the order id or the external
/// order id is already taken.
#[derive(Debug, Clone)]
pub struct InsertOrder {
    pub record: OrderRecord,
}

impl Processor<InsertOrder> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertOrder")]
    async fn process(&self, insert: InsertOrder) -> Result<bool, sqlx::Error> {
        let record = insert.record;
        let result = sqlx::query(
            r#"
            INSERT INTO orders
                (order_id, external_order_id, items, status, meta, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(record.order_id)
        .bind(record.external_order_id)
        .bind(Json(record.items))
        .bind(record.status.as_str())
        .bind(Json(record.meta))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Replace every mutable column of an existing order. `created_at` is kept.
/// Returns `false` when no such order exists.
#[derive(Debug, Clone)]
pub struct ReplaceOrder {
    pub record: OrderRecord,
}

impl Processor<ReplaceOrder> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ReplaceOrder")]
    async fn process(&self, replace: ReplaceOrder) -> Result<bool, sqlx::Error> {
        let record = replace.record;
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET external_order_id = $2,
                items = $3,
                status = $4,
                meta = $5,
                updated_at = $6
            WHERE order_id = $1
            "#,
        )
        .bind(record.order_id)
        .bind(record.external_order_id)
        .bind(Json(record.items))
        .bind(record.status.as_str())
        .bind(Json(record.meta))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
