use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use larder_core::{IngredientId, MeasurementUnit};
use larder_inventory::{
    DecrementOutcome, Ingredient, StockRepository, StockStoreError, StockTransaction,
};
use larder_sales::Order;

use crate::placement::OrderWriter;

#[derive(Debug, Default)]
struct StockState {
    ingredients: HashMap<IngredientId, Ingredient>,
    orders: Vec<Order>,
}

/// What a transaction needs to undo its writes. Orders are append-only, so
/// their length is enough.
#[derive(Debug)]
struct Undo {
    ingredients: HashMap<IngredientId, Ingredient>,
    orders_len: usize,
}

impl StockState {
    fn undo_point(&self) -> Undo {
        Undo {
            ingredients: self.ingredients.clone(),
            orders_len: self.orders.len(),
        }
    }

    fn restore(&mut self, undo: Undo) {
        self.ingredients = undo.ingredients;
        self.orders.truncate(undo.orders_len);
    }

    fn stocked(
        &mut self,
        ingredient_id: IngredientId,
        unit: MeasurementUnit,
    ) -> Result<&mut Ingredient, StockStoreError> {
        let ingredient = self
            .ingredients
            .get_mut(&ingredient_id)
            .ok_or(StockStoreError::NotFound(ingredient_id))?;
        if ingredient.unit() != unit {
            return Err(StockStoreError::UnitMismatch {
                ingredient_id,
                stocked: ingredient.unit(),
                requested: unit,
            });
        }
        Ok(ingredient)
    }
}

/// In-memory stock store.
///
/// Intended for tests/dev. Transactions are fully serialized: `begin` waits for
/// the store lock and the transaction holds it until commit or rollback, so a
/// transaction never observes another one's uncommitted writes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockRepository {
    state: Arc<Mutex<StockState>>,
}

impl InMemoryStockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ingredients(ingredients: impl IntoIterator<Item = Ingredient>) -> Self {
        let ingredients = ingredients
            .into_iter()
            .map(|i| (i.id_typed(), i))
            .collect();
        Self {
            state: Arc::new(Mutex::new(StockState {
                ingredients,
                orders: Vec::new(),
            })),
        }
    }

    /// Insert or replace an ingredient outside of any transaction.
    pub async fn upsert(&self, ingredient: Ingredient) {
        let mut state = self.state.lock().await;
        state.ingredients.insert(ingredient.id_typed(), ingredient);
    }

    pub async fn ingredient(&self, id: IngredientId) -> Option<Ingredient> {
        self.state.lock().await.ingredients.get(&id).cloned()
    }

    /// Committed orders, in commit order.
    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }
}

#[async_trait]
impl StockRepository for InMemoryStockRepository {
    type Transaction = InMemoryStockTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StockStoreError> {
        let guard = self.state.clone().lock_owned().await;
        let undo = guard.undo_point();
        Ok(InMemoryStockTransaction {
            state: guard,
            undo: Some(undo),
        })
    }
}

/// Exclusive unit of work over the in-memory store.
///
/// Writes go straight to the shared state; the undo point is applied on
/// rollback or when the transaction is dropped uncommitted.
#[derive(Debug)]
pub struct InMemoryStockTransaction {
    state: OwnedMutexGuard<StockState>,
    undo: Option<Undo>,
}

impl Drop for InMemoryStockTransaction {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            self.state.restore(undo);
            debug!("in-memory stock transaction rolled back");
        }
    }
}

#[async_trait]
impl StockTransaction for InMemoryStockTransaction {
    async fn load_ingredients(
        &mut self,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, StockStoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.state.ingredients.get(id).cloned())
            .collect())
    }

    async fn conditional_decrement(
        &mut self,
        ingredient_id: IngredientId,
        amount: Decimal,
        unit: MeasurementUnit,
    ) -> Result<DecrementOutcome, StockStoreError> {
        let ingredient = self.state.stocked(ingredient_id, unit)?;
        if ingredient.try_decrement(amount, Utc::now()) {
            Ok(DecrementOutcome::Applied {
                remaining: ingredient.stock(),
            })
        } else {
            Ok(DecrementOutcome::Insufficient {
                available: ingredient.stock(),
            })
        }
    }

    async fn increment(
        &mut self,
        ingredient_id: IngredientId,
        amount: Decimal,
        unit: MeasurementUnit,
    ) -> Result<Decimal, StockStoreError> {
        let ingredient = self.state.stocked(ingredient_id, unit)?;
        ingredient
            .increment(amount, Utc::now())
            .map_err(|e| StockStoreError::Backend(e.to_string()))?;
        Ok(ingredient.stock())
    }

    async fn commit(mut self) -> Result<(), StockStoreError> {
        self.undo = None;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StockStoreError> {
        // Dropping restores the snapshot.
        Ok(())
    }
}

#[async_trait]
impl OrderWriter for InMemoryStockTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<(), StockStoreError> {
        if self.state.orders.iter().any(|o| o.id_typed() == order.id_typed()) {
            return Err(StockStoreError::Backend(format!(
                "order {} already recorded",
                order.id_typed()
            )));
        }
        self.state.orders.push(order.clone());
        Ok(())
    }
}
