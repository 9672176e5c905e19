//! Guarded deduction: commit an order's aggregated requirements against stock.
//!
//! For each requirement the base-unit total is converted back into the
//! ingredient's stocking unit and a single conditional decrement is issued.
//! The first failed guard aborts with `InsufficientStock`; decrements already
//! applied are left for the enclosing transaction to roll back.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use larder_core::{IngredientId, OrderId, Quantity, UnitError};
use larder_menu::RecipeCatalog;
use larder_sales::Order;

use crate::error::{InventoryError, Shortfall};
use crate::ingredient::Ingredient;
use crate::requirements::{Requirements, aggregate_requirements, referenced_ingredients};
use crate::stock::{DecrementOutcome, StockStoreError, StockTransaction};

/// Engine behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeductionOptions {
    /// Treat a recipe with no ingredient lines as "nothing to deduct" instead of
    /// failing with `MissingRecipe`. Off by default.
    pub allow_empty_recipes: bool,
}

/// Stock taken from one ingredient for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockDeduction {
    pub ingredient_id: IngredientId,
    pub ingredient: String,
    pub deducted: Quantity,
    pub remaining: Quantity,
    /// Remaining stock is at or below the ingredient's restock threshold.
    pub needs_restock: bool,
}

/// Outcome of a successful deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeductionReport {
    pub order_id: OrderId,
    pub deductions: Vec<StockDeduction>,
    pub deducted_at: DateTime<Utc>,
}

impl DeductionReport {
    pub fn deducted(&self, ingredient_id: &IngredientId) -> Option<Quantity> {
        self.deductions
            .iter()
            .find(|d| &d.ingredient_id == ingredient_id)
            .map(|d| d.deducted)
    }

    pub fn low_stock(&self) -> impl Iterator<Item = &StockDeduction> {
        self.deductions.iter().filter(|d| d.needs_restock)
    }
}

/// Inventory deduction engine.
///
/// Stateless apart from its options; storage is always passed in as an open
/// [`StockTransaction`].
#[derive(Debug, Clone, Default)]
pub struct DeductionEngine {
    options: DeductionOptions,
}

impl DeductionEngine {
    pub fn new(options: DeductionOptions) -> Self {
        Self { options }
    }

    /// Compute and apply the ingredient consumption of `order`.
    ///
    /// On any error the caller must abort the transaction: earlier decrements
    /// of the same order may already have been applied.
    #[instrument(
        skip(self, tx, order, catalog),
        fields(order_id = %order.id_typed(), lines = order.items().len()),
        err
    )]
    pub async fn deduct<T, C>(
        &self,
        tx: &mut T,
        order: &Order,
        catalog: &C,
    ) -> Result<DeductionReport, InventoryError>
    where
        T: StockTransaction,
        C: RecipeCatalog + Sync + ?Sized,
    {
        let (snapshot, requirements) = self.plan(tx, order, catalog).await?;

        let mut deductions = Vec::with_capacity(requirements.len());
        for req in requirements.iter() {
            let amount = req.in_stock_unit();

            match tx
                .conditional_decrement(req.ingredient_id, amount.amount(), amount.unit())
                .await?
            {
                DecrementOutcome::Applied { remaining } => {
                    let needs_restock = snapshot
                        .get(&req.ingredient_id)
                        .is_some_and(|i| remaining <= i.restock_threshold());
                    debug!(
                        ingredient = %req.ingredient,
                        deducted = %amount,
                        remaining = %Quantity::new(remaining, amount.unit()),
                        "stock decremented"
                    );
                    deductions.push(StockDeduction {
                        ingredient_id: req.ingredient_id,
                        ingredient: req.ingredient.clone(),
                        deducted: amount,
                        remaining: Quantity::new(remaining, amount.unit()),
                        needs_restock,
                    });
                }
                DecrementOutcome::Insufficient { available } => {
                    let shortfall = shortfall(&req.ingredient, req.ingredient_id, amount, available);
                    warn!(%shortfall, "stock guard failed");
                    return Err(InventoryError::InsufficientStock(shortfall));
                }
            }
        }

        let report = DeductionReport {
            order_id: order.id_typed(),
            deductions,
            deducted_at: Utc::now(),
        };

        for low in report.low_stock() {
            warn!(
                ingredient = %low.ingredient,
                remaining = %low.remaining,
                "ingredient at or below restock threshold"
            );
        }
        info!(ingredients = report.deductions.len(), "order deducted from stock");

        Ok(report)
    }

    /// Read-only preview: every ingredient the order would run short of.
    ///
    /// An empty result means the order could be deducted as stock stands now
    /// (concurrent orders may still win the race).
    #[instrument(skip(self, tx, order, catalog), fields(order_id = %order.id_typed()), err)]
    pub async fn check_availability<T, C>(
        &self,
        tx: &mut T,
        order: &Order,
        catalog: &C,
    ) -> Result<Vec<Shortfall>, InventoryError>
    where
        T: StockTransaction,
        C: RecipeCatalog + Sync + ?Sized,
    {
        let (snapshot, requirements) = self.plan(tx, order, catalog).await?;

        let shortfalls = requirements
            .iter()
            .filter_map(|req| {
                let available = snapshot.get(&req.ingredient_id)?.stock();
                let amount = req.in_stock_unit();
                (available < amount.amount())
                    .then(|| shortfall(&req.ingredient, req.ingredient_id, amount, available))
            })
            .collect();

        Ok(shortfalls)
    }

    /// Add stock to an ingredient. `quantity` may be in any unit of the
    /// ingredient's group; the new stock level is returned in the stocking unit.
    #[instrument(skip(self, tx, quantity), fields(quantity = %quantity), err)]
    pub async fn restock<T>(
        &self,
        tx: &mut T,
        ingredient_id: IngredientId,
        quantity: Quantity,
    ) -> Result<Quantity, InventoryError>
    where
        T: StockTransaction,
    {
        if quantity.amount() <= Decimal::ZERO {
            return Err(InventoryError::InvalidQuantity(format!(
                "restock amount must be positive, got {quantity}"
            )));
        }

        let ingredient = tx
            .load_ingredients(&[ingredient_id])
            .await?
            .into_iter()
            .next()
            .ok_or(StockStoreError::NotFound(ingredient_id))?;

        let amount = quantity
            .convert_to(ingredient.unit())
            .map_err(|source| match source {
                UnitError::Overflow { .. } => InventoryError::InvalidQuantity(source.to_string()),
                source => InventoryError::UnitMismatch {
                    ingredient_id,
                    ingredient: ingredient.name().to_string(),
                    source,
                },
            })?;
        if ingredient.stock().checked_add(amount.amount()).is_none() {
            return Err(InventoryError::InvalidQuantity(format!(
                "restocking '{}' by {amount} exceeds the representable range",
                ingredient.name()
            )));
        }

        let stock = tx
            .increment(ingredient_id, amount.amount(), amount.unit())
            .await?;

        info!(ingredient = %ingredient.name(), added = %amount, "ingredient restocked");
        Ok(Quantity::new(stock, ingredient.unit()))
    }

    async fn plan<T, C>(
        &self,
        tx: &mut T,
        order: &Order,
        catalog: &C,
    ) -> Result<(HashMap<IngredientId, Ingredient>, Requirements), InventoryError>
    where
        T: StockTransaction,
        C: RecipeCatalog + Sync + ?Sized,
    {
        let ids = referenced_ingredients(order, catalog, &self.options)?;
        let snapshot: HashMap<_, _> = tx
            .load_ingredients(&ids)
            .await?
            .into_iter()
            .map(|i| (i.id_typed(), i))
            .collect();

        let requirements = aggregate_requirements(order, catalog, &snapshot, &self.options)?;
        Ok((snapshot, requirements))
    }
}

fn shortfall(
    ingredient: &str,
    ingredient_id: IngredientId,
    required: Quantity,
    available: Decimal,
) -> Shortfall {
    let unit = required.unit();
    Shortfall {
        ingredient_id,
        ingredient: ingredient.to_string(),
        required,
        available: Quantity::new(available, unit),
        shortfall: Quantity::new(required.amount() - available, unit),
    }
}
