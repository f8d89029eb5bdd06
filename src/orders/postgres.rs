// src/orders/postgres.rs
//! PostgreSQL order store. One row per order, updated in place; every state
//! change is a conditional UPDATE guarded by the expected current status.

use crate::error::{OrderError, Result};
use crate::orders::order::{Order, OrderStatus, Transition};
use crate::orders::store::OrderStore;
use crate::routing::ExecutionReceipt;
use async_trait::async_trait;
use log::{debug, info};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id              TEXT PRIMARY KEY,
    input_token     TEXT NOT NULL,
    output_token    TEXT NOT NULL,
    amount          DOUBLE PRECISION NOT NULL,
    status          TEXT NOT NULL,
    tx_hash         TEXT,
    venue           TEXT,
    executed_price  DOUBLE PRECISION,
    failure_reason  TEXT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const SELECT_ORDER: &str = r#"
SELECT id, input_token, output_token, amount, status, tx_hash, venue,
       executed_price, failure_reason, created_at, updated_at
FROM orders WHERE id = $1
"#;

#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL order store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_ORDERS_TABLE).execute(&self.pool).await?;
        info!("Orders table ready");
        Ok(())
    }

    /// Maps "no row updated" to `Ignored` for a known id, `OrderNotFound` otherwise.
    async fn outcome(&self, id: &str, rows_affected: u64) -> Result<Transition> {
        if rows_affected > 0 {
            return Ok(Transition::Applied);
        }
        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(Transition::Ignored),
            None => Err(OrderError::OrderNotFound(id.to_string())),
        }
    }
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        input_token: row.try_get("input_token")?,
        output_token: row.try_get("output_token")?,
        amount: row.try_get("amount")?,
        status: status.parse()?,
        tx_hash: row.try_get("tx_hash")?,
        venue: row.try_get("venue")?,
        executed_price: row.try_get("executed_price")?,
        failure_reason: row.try_get("failure_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// The state an order must be in for `to` to be the next success-path step.
fn predecessor(to: OrderStatus) -> Option<OrderStatus> {
    match to {
        OrderStatus::Routing => Some(OrderStatus::Pending),
        OrderStatus::Building => Some(OrderStatus::Routing),
        OrderStatus::Submitted => Some(OrderStatus::Building),
        OrderStatus::Confirmed => Some(OrderStatus::Submitted),
        OrderStatus::Pending | OrderStatus::Failed => None,
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, input_token, output_token, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&order.id)
        .bind(&order.input_token)
        .bind(&order.output_token)
        .bind(order.amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Inserted order {} as {}", order.id, order.status);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Order>> {
        let row = sqlx::query(SELECT_ORDER)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn transition(&self, id: &str, to: OrderStatus) -> Result<Transition> {
        let from = match predecessor(to) {
            Some(from) if !to.is_terminal() => from,
            _ => return Ok(Transition::Ignored),
        };
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        self.outcome(id, result.rows_affected()).await
    }

    async fn begin_attempt(&self, id: &str) -> Result<Order> {
        sqlx::query(
            r#"
            UPDATE orders SET status = 'pending', failure_reason = NULL, updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('pending', 'confirmed')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(id.to_string()))
    }

    async fn mark_confirmed(&self, id: &str, receipt: &ExecutionReceipt) -> Result<Transition> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'confirmed', tx_hash = $1, venue = $2, executed_price = $3,
                failure_reason = NULL, updated_at = NOW()
            WHERE id = $4 AND status = 'submitted'
            "#,
        )
        .bind(&receipt.tx_reference)
        .bind(&receipt.venue)
        .bind(receipt.executed_price)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.outcome(id, result.rows_affected()).await
    }

    async fn mark_failed(&self, id: &str, reason: &str) -> Result<Transition> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'failed', failure_reason = $1, tx_hash = NULL, venue = NULL,
                executed_price = NULL, updated_at = NOW()
            WHERE id = $2 AND status NOT IN ('confirmed', 'failed')
            "#,
        )
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.outcome(id, result.rows_affected()).await
    }
}
