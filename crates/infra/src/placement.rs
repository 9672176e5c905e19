//! Order placement: the transactional boundary around stock deduction.
//!
//! `place` runs one storage transaction per order:
//!
//! 1. begin
//! 2. record the order
//! 3. deduct every ingredient the order consumes
//! 4. commit
//!
//! Any failure rolls the whole transaction back, so an order is either
//! recorded with all of its deductions or leaves no trace at all.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument, warn};

use larder_core::{DomainError, IngredientId, Quantity};
use larder_inventory::{
    DeductionEngine, DeductionReport, InventoryError, Shortfall, StockRepository,
    StockStoreError, StockTransaction,
};
use larder_menu::RecipeCatalog;
use larder_sales::Order;

/// Persists orders inside a stock transaction.
#[async_trait]
pub trait OrderWriter: Send {
    async fn insert_order(&mut self, order: &Order) -> Result<(), StockStoreError>;
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("invalid order: {0}")]
    InvalidOrder(#[from] DomainError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("order storage failed: {0}")]
    Store(#[from] StockStoreError),
}

impl PlacementError {
    /// The shortfall, when the order failed for lack of stock.
    pub fn shortfall(&self) -> Option<&Shortfall> {
        match self {
            PlacementError::Inventory(InventoryError::InsufficientStock(s)) => Some(s),
            _ => None,
        }
    }
}

/// Places orders against a stock repository and a recipe catalog.
#[derive(Debug, Clone)]
pub struct OrderPlacement<R, C> {
    repository: R,
    catalog: C,
    engine: DeductionEngine,
}

impl<R, C> OrderPlacement<R, C>
where
    R: StockRepository,
    R::Transaction: OrderWriter,
    C: RecipeCatalog + Send + Sync,
{
    pub fn new(repository: R, catalog: C, engine: DeductionEngine) -> Self {
        Self {
            repository,
            catalog,
            engine,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Record `order` and deduct its ingredients atomically.
    #[instrument(skip(self, order), fields(order_id = %order.id_typed()), err)]
    pub async fn place(&self, order: &Order) -> Result<DeductionReport, PlacementError> {
        order.ensure_not_empty()?;

        let mut tx = self.repository.begin().await?;
        match self.record_and_deduct(&mut tx, order).await {
            Ok(report) => {
                tx.commit().await?;
                info!(low_stock = report.low_stock().count(), "order placed");
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed after placement error");
                }
                Err(err)
            }
        }
    }

    /// Restock one ingredient in its own transaction; returns the new stock.
    #[instrument(skip(self, ingredient_id), fields(ingredient_id = %ingredient_id), err)]
    pub async fn restock(
        &self,
        ingredient_id: IngredientId,
        quantity: Quantity,
    ) -> Result<Quantity, PlacementError> {
        let mut tx = self.repository.begin().await?;
        match self.engine.restock(&mut tx, ingredient_id, quantity).await {
            Ok(stock) => {
                tx.commit().await?;
                Ok(stock)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed after restock error");
                }
                Err(err.into())
            }
        }
    }

    /// Every shortfall `order` would hit right now. Never mutates stock.
    pub async fn check_availability(&self, order: &Order) -> Result<Vec<Shortfall>, PlacementError> {
        let mut tx = self.repository.begin().await?;
        let result = self
            .engine
            .check_availability(&mut tx, order, &self.catalog)
            .await;
        tx.rollback().await?;
        Ok(result?)
    }

    async fn record_and_deduct(
        &self,
        tx: &mut R::Transaction,
        order: &Order,
    ) -> Result<DeductionReport, PlacementError> {
        tx.insert_order(order).await?;
        let report = self.engine.deduct(tx, order, &self.catalog).await?;
        Ok(report)
    }
}
