//! Stock storage port.
//!
//! The deduction engine talks to storage only through these traits, so it can
//! be driven by an in-memory fake in tests and by a SQL adapter in production.
//!
//! ## Contract
//!
//! - `conditional_decrement` must be a single atomic operation at the storage
//!   layer (decrement only if resulting stock >= 0), never a read-then-write pair.
//! - Everything done through one `StockTransaction` commits or rolls back as a
//!   unit. Dropping a transaction without committing rolls it back.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use larder_core::{IngredientId, MeasurementUnit};

use crate::ingredient::Ingredient;

/// Result of a guarded decrement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Stock was decremented; `remaining` is the new stock in the stocking unit.
    Applied { remaining: Decimal },
    /// The guard failed; nothing changed. `available` is the current stock.
    Insufficient { available: Decimal },
}

impl DecrementOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DecrementOutcome::Applied { .. })
    }
}

/// Storage-level failure.
///
/// These are infrastructure errors, as opposed to business outcomes such as
/// insufficient stock.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockStoreError {
    #[error("ingredient {0} not found")]
    NotFound(IngredientId),

    #[error("ingredient {ingredient_id} is stocked in {stocked}, not {requested}")]
    UnitMismatch {
        ingredient_id: IngredientId,
        stocked: MeasurementUnit,
        requested: MeasurementUnit,
    },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// One all-or-nothing unit of work against stock.
#[async_trait]
pub trait StockTransaction: Send {
    /// Load the given ingredients. Unknown ids are omitted from the result.
    async fn load_ingredients(
        &mut self,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, StockStoreError>;

    /// Atomically decrement stock by `amount` (expressed in `unit`, which must be
    /// the ingredient's stocking unit) if and only if current stock >= `amount`.
    async fn conditional_decrement(
        &mut self,
        ingredient_id: IngredientId,
        amount: Decimal,
        unit: MeasurementUnit,
    ) -> Result<DecrementOutcome, StockStoreError>;

    /// Increase stock by `amount` (in the stocking unit); returns the new stock.
    async fn increment(
        &mut self,
        ingredient_id: IngredientId,
        amount: Decimal,
        unit: MeasurementUnit,
    ) -> Result<Decimal, StockStoreError>;

    async fn commit(self) -> Result<(), StockStoreError>;

    async fn rollback(self) -> Result<(), StockStoreError>;
}

/// Source of stock transactions.
#[async_trait]
pub trait StockRepository: Send + Sync {
    type Transaction: StockTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StockStoreError>;
}
