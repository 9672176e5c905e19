//! Postgres-backed stock store.
//!
//! Every decrement is a single conditional statement:
//!
//! ```sql
//! UPDATE ingredients SET stock = stock - $2
//! WHERE id = $1 AND unit = $3 AND stock >= $2
//! RETURNING stock
//! ```
//!
//! Stock columns are unconstrained `NUMERIC`, so stored values keep the full
//! precision of the `Decimal` amounts the engine computes.
//!
//! The row lock taken by the `UPDATE` serializes concurrent orders on the same
//! ingredient, and the `WHERE` guard means stock can never go negative. When no
//! row comes back, a follow-up `SELECT` tells "not found", "wrong unit" and
//! "not enough" apart.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StockStoreError |
//! |------------|----------------------|-----------------|
//! | Database (check violation) | `23514` | `Backend` (stock would go negative) |
//! | Database (unique violation) | `23505` | `Backend` (duplicate order id) |
//! | Any other | N/A | `Backend` |

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use larder_core::{IngredientId, MeasurementUnit};
use larder_inventory::{
    DecrementOutcome, Ingredient, StockRepository, StockStoreError, StockTransaction,
};
use larder_sales::Order;

use crate::config::DatabaseConfig;
use crate::placement::OrderWriter;

/// Schema for the `ingredients` and `orders` tables.
pub const SCHEMA: &str = include_str!("../../migrations/0001_stock.sql");

#[derive(Debug, Clone)]
pub struct PostgresStockRepository {
    pool: Arc<PgPool>,
}

impl PostgresStockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a connection pool for `config`.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .with_context(|| {
                format!(
                    "failed to connect to Postgres (max_connections = {})",
                    config.max_connections
                )
            })?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .context("failed to apply stock schema")?;
        Ok(())
    }

    /// Insert or replace an ingredient outside of any order transaction.
    #[instrument(skip(self, ingredient), fields(ingredient = %ingredient.name()), err)]
    pub async fn upsert_ingredient(&self, ingredient: &Ingredient) -> Result<(), StockStoreError> {
        sqlx::query(
            r#"
            INSERT INTO ingredients (id, name, stock, unit, restock_threshold, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                stock = EXCLUDED.stock,
                unit = EXCLUDED.unit,
                restock_threshold = EXCLUDED.restock_threshold,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(ingredient.id_typed().as_uuid())
        .bind(ingredient.name())
        .bind(ingredient.stock())
        .bind(ingredient.unit().symbol())
        .bind(ingredient.restock_threshold())
        .bind(ingredient.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_ingredient", e))?;
        Ok(())
    }
}

#[async_trait]
impl StockRepository for PostgresStockRepository {
    type Transaction = PgStockTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StockStoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PgStockTransaction { tx })
    }
}

/// One Postgres transaction. Dropping it uncommitted rolls back.
pub struct PgStockTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgStockTransaction {
    /// Work out why a guarded statement touched no row.
    async fn explain_miss(
        &mut self,
        ingredient_id: IngredientId,
        unit: MeasurementUnit,
    ) -> Result<Decimal, StockStoreError> {
        let row = sqlx::query("SELECT stock, unit FROM ingredients WHERE id = $1")
            .bind(ingredient_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("select_stock", e))?
            .ok_or(StockStoreError::NotFound(ingredient_id))?;

        let stock: Decimal = row
            .try_get("stock")
            .map_err(|e| map_sqlx_error("select_stock", e))?;
        let stocked = parse_unit(&row)?;
        if stocked != unit {
            return Err(StockStoreError::UnitMismatch {
                ingredient_id,
                stocked,
                requested: unit,
            });
        }
        Ok(stock)
    }
}

#[async_trait]
impl StockTransaction for PgStockTransaction {
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn load_ingredients(
        &mut self,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, StockStoreError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, name, stock, unit, restock_threshold, updated_at
            FROM ingredients
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&uuids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_ingredients", e))?;

        let mut ingredients = Vec::with_capacity(rows.len());
        for row in rows {
            let row = IngredientRow::from_row(&row)
                .map_err(|e| map_sqlx_error("decode_ingredient", e))?;
            ingredients.push(row.try_into()?);
        }
        Ok(ingredients)
    }

    #[instrument(skip(self), err)]
    async fn conditional_decrement(
        &mut self,
        ingredient_id: IngredientId,
        amount: Decimal,
        unit: MeasurementUnit,
    ) -> Result<DecrementOutcome, StockStoreError> {
        let remaining: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE ingredients
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND unit = $3 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(ingredient_id.as_uuid())
        .bind(amount)
        .bind(unit.symbol())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("conditional_decrement", e))?;

        match remaining {
            Some(remaining) => Ok(DecrementOutcome::Applied { remaining }),
            None => {
                let available = self.explain_miss(ingredient_id, unit).await?;
                debug!(%available, "conditional decrement refused");
                Ok(DecrementOutcome::Insufficient { available })
            }
        }
    }

    #[instrument(skip(self), err)]
    async fn increment(
        &mut self,
        ingredient_id: IngredientId,
        amount: Decimal,
        unit: MeasurementUnit,
    ) -> Result<Decimal, StockStoreError> {
        let stock: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE ingredients
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1 AND unit = $3
            RETURNING stock
            "#,
        )
        .bind(ingredient_id.as_uuid())
        .bind(amount)
        .bind(unit.symbol())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("increment", e))?;

        match stock {
            Some(stock) => Ok(stock),
            None => {
                // Only reachable on NotFound / UnitMismatch; explain_miss raises them.
                self.explain_miss(ingredient_id, unit).await?;
                Err(StockStoreError::Backend(format!(
                    "increment of ingredient {ingredient_id} matched no row"
                )))
            }
        }
    }

    async fn commit(self) -> Result<(), StockStoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StockStoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl OrderWriter for PgStockTransaction {
    #[instrument(skip(self, order), fields(order_id = %order.id_typed()), err)]
    async fn insert_order(&mut self, order: &Order) -> Result<(), StockStoreError> {
        let items = serde_json::to_value(order.items())
            .map_err(|e| StockStoreError::Backend(format!("failed to encode order items: {e}")))?;

        sqlx::query("INSERT INTO orders (id, placed_at, items) VALUES ($1, $2, $3)")
            .bind(order.id_typed().as_uuid())
            .bind(order.placed_at())
            .bind(items)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StockStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let detail = match db_err.code().as_deref() {
                Some("23514") => " (check constraint violated)",
                Some("23505") => " (duplicate key)",
                _ => "",
            };
            StockStoreError::Backend(format!(
                "database error in {operation}: {}{detail}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => {
            StockStoreError::Backend(format!("connection pool closed during {operation}"))
        }
        other => StockStoreError::Backend(format!("{operation} failed: {other}")),
    }
}

fn parse_unit(row: &PgRow) -> Result<MeasurementUnit, StockStoreError> {
    let symbol: String = row
        .try_get("unit")
        .map_err(|e| map_sqlx_error("decode_unit", e))?;
    symbol
        .parse()
        .map_err(|e| StockStoreError::Backend(format!("bad unit in ingredients table: {e}")))
}

#[derive(Debug)]
struct IngredientRow {
    id: Uuid,
    name: String,
    stock: Decimal,
    unit: String,
    restock_threshold: Decimal,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for IngredientRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(IngredientRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            stock: row.try_get("stock")?,
            unit: row.try_get("unit")?,
            restock_threshold: row.try_get("restock_threshold")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<IngredientRow> for Ingredient {
    type Error = StockStoreError;

    fn try_from(row: IngredientRow) -> Result<Self, Self::Error> {
        let unit: MeasurementUnit = row
            .unit
            .parse()
            .map_err(|e| StockStoreError::Backend(format!("bad unit in ingredients table: {e}")))?;
        let ingredient = Ingredient::new(
            IngredientId::from_uuid(row.id),
            row.name,
            row.stock,
            unit,
            row.restock_threshold,
        )
        .map_err(|e| StockStoreError::Backend(format!("invalid ingredient row {}: {e}", row.id)))?;
        Ok(ingredient.with_updated_at(row.updated_at))
    }
}
