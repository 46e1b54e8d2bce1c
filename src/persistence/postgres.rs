//! PostgreSQL order store.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::domain::OrderRecord;
use crate::error::Result;

use super::OrderStore;

/// PostgreSQL storage adapter for order records.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Connect and create a new store.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool (zero-cost reuse).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the orders table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                record_id UUID PRIMARY KEY,
                task_id UUID NOT NULL,
                broker_order_id TEXT NOT NULL,
                broker TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                quantity NUMERIC NOT NULL,
                limit_price NUMERIC,
                stop_price NUMERIC,
                filled_quantity NUMERIC NOT NULL,
                avg_fill_price NUMERIC,
                status TEXT NOT NULL,
                strategy TEXT,
                analysis JSONB,
                manual_approval BOOLEAN NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                submitted_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(skip(self, record), fields(task_id = %record.task_id, symbol = %record.symbol))]
    async fn record_order(&self, record: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                record_id, task_id, broker_order_id, broker, symbol, side,
                order_type, quantity, limit_price, stop_price, filled_quantity,
                avg_fill_price, status, strategy, analysis, manual_approval,
                created_at, submitted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (record_id) DO NOTHING
            "#,
        )
        .bind(record.record_id)
        .bind(record.task_id)
        .bind(&record.broker_order_id)
        .bind(&record.broker)
        .bind(&record.symbol)
        .bind(record.side.to_string())
        .bind(record.order_type.to_string())
        .bind(record.quantity)
        .bind(record.limit_price)
        .bind(record.stop_price)
        .bind(record.filled_quantity)
        .bind(record.avg_fill_price)
        .bind(record.status.to_string())
        .bind(&record.strategy)
        .bind(&record.analysis)
        .bind(record.manual_approval)
        .bind(record.created_at)
        .bind(record.submitted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
