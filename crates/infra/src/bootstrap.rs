//! Composition root: turn an [`AppConfig`] into a ready [`OrderPlacement`].
//!
//! `LARDER_DATABASE_URL` decides the stock backend. Without it, stock lives in
//! process memory and is lost on exit.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use larder_core::{IngredientId, MeasurementUnit};
use larder_inventory::{
    DecrementOutcome, DeductionEngine, Ingredient, StockRepository, StockStoreError,
    StockTransaction,
};
use larder_menu::RecipeCatalog;
use larder_sales::Order;

use crate::config::AppConfig;
use crate::placement::{OrderPlacement, OrderWriter};
use crate::stock_store::{
    InMemoryStockRepository, InMemoryStockTransaction, PgStockTransaction, PostgresStockRepository,
};

/// The stock store selected by configuration.
#[derive(Debug, Clone)]
pub enum StockBackend {
    InMemory(InMemoryStockRepository),
    Postgres(PostgresStockRepository),
}

impl StockBackend {
    /// Connect (and migrate) Postgres when a database is configured, otherwise
    /// start an empty in-memory store.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        match &config.database {
            Some(database) => {
                let repo = PostgresStockRepository::connect(database).await?;
                repo.migrate().await?;
                info!(max_connections = database.max_connections, "using Postgres stock store");
                Ok(StockBackend::Postgres(repo))
            }
            None => {
                info!("no database configured, using in-memory stock store");
                Ok(StockBackend::InMemory(InMemoryStockRepository::new()))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StockBackend::InMemory(_) => "in-memory",
            StockBackend::Postgres(_) => "postgres",
        }
    }

    /// Insert or replace an ingredient outside of any order transaction.
    pub async fn upsert_ingredient(&self, ingredient: Ingredient) -> Result<(), StockStoreError> {
        match self {
            StockBackend::InMemory(repo) => {
                repo.upsert(ingredient).await;
                Ok(())
            }
            StockBackend::Postgres(repo) => repo.upsert_ingredient(&ingredient).await,
        }
    }
}

/// Transaction of whichever backend is configured.
pub enum BackendTransaction {
    InMemory(InMemoryStockTransaction),
    Postgres(PgStockTransaction),
}

#[async_trait]
impl StockRepository for StockBackend {
    type Transaction = BackendTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StockStoreError> {
        Ok(match self {
            StockBackend::InMemory(repo) => BackendTransaction::InMemory(repo.begin().await?),
            StockBackend::Postgres(repo) => BackendTransaction::Postgres(repo.begin().await?),
        })
    }
}

#[async_trait]
impl StockTransaction for BackendTransaction {
    async fn load_ingredients(
        &mut self,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, StockStoreError> {
        match self {
            BackendTransaction::InMemory(tx) => tx.load_ingredients(ids).await,
            BackendTransaction::Postgres(tx) => tx.load_ingredients(ids).await,
        }
    }

    async fn conditional_decrement(
        &mut self,
        ingredient_id: IngredientId,
        amount: Decimal,
        unit: MeasurementUnit,
    ) -> Result<DecrementOutcome, StockStoreError> {
        match self {
            BackendTransaction::InMemory(tx) => {
                tx.conditional_decrement(ingredient_id, amount, unit).await
            }
            BackendTransaction::Postgres(tx) => {
                tx.conditional_decrement(ingredient_id, amount, unit).await
            }
        }
    }

    async fn increment(
        &mut self,
        ingredient_id: IngredientId,
        amount: Decimal,
        unit: MeasurementUnit,
    ) -> Result<Decimal, StockStoreError> {
        match self {
            BackendTransaction::InMemory(tx) => tx.increment(ingredient_id, amount, unit).await,
            BackendTransaction::Postgres(tx) => tx.increment(ingredient_id, amount, unit).await,
        }
    }

    async fn commit(self) -> Result<(), StockStoreError> {
        match self {
            BackendTransaction::InMemory(tx) => tx.commit().await,
            BackendTransaction::Postgres(tx) => tx.commit().await,
        }
    }

    async fn rollback(self) -> Result<(), StockStoreError> {
        match self {
            BackendTransaction::InMemory(tx) => tx.rollback().await,
            BackendTransaction::Postgres(tx) => tx.rollback().await,
        }
    }
}

#[async_trait]
impl OrderWriter for BackendTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<(), StockStoreError> {
        match self {
            BackendTransaction::InMemory(tx) => tx.insert_order(order).await,
            BackendTransaction::Postgres(tx) => tx.insert_order(order).await,
        }
    }
}

/// Install logging, select the stock backend, and wire the deduction engine.
pub async fn bootstrap<C>(
    config: &AppConfig,
    catalog: C,
) -> anyhow::Result<OrderPlacement<StockBackend, C>>
where
    C: RecipeCatalog + Send + Sync,
{
    larder_observability::init_with(&config.log);
    let backend = StockBackend::from_config(config).await?;
    info!(
        backend = backend.kind(),
        allow_empty_recipes = config.deduction.allow_empty_recipes,
        "order placement ready"
    );
    Ok(OrderPlacement::new(
        backend,
        catalog,
        DeductionEngine::new(config.deduction),
    ))
}
