use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, Entity, IngredientId, MeasurementUnit, Quantity};

/// A stocked physical resource.
///
/// `stock` and `restock_threshold` are both expressed in the stocking `unit`.
/// Stock is never negative: decrements go through [`Ingredient::try_decrement`],
/// which refuses to overdraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    id: IngredientId,
    name: String,
    stock: Decimal,
    unit: MeasurementUnit,
    restock_threshold: Decimal,
    updated_at: DateTime<Utc>,
}

impl Ingredient {
    pub fn new(
        id: IngredientId,
        name: impl Into<String>,
        stock: Decimal,
        unit: MeasurementUnit,
        restock_threshold: Decimal,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("ingredient name cannot be empty"));
        }
        if stock < Decimal::ZERO {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        if restock_threshold < Decimal::ZERO {
            return Err(DomainError::validation("restock threshold cannot be negative"));
        }

        Ok(Self {
            id,
            name,
            stock,
            unit,
            restock_threshold,
            updated_at: Utc::now(),
        })
    }

    /// Override the last-modified timestamp (storage rehydration).
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn id_typed(&self) -> IngredientId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> Decimal {
        self.stock
    }

    pub fn unit(&self) -> MeasurementUnit {
        self.unit
    }

    pub fn restock_threshold(&self) -> Decimal {
        self.restock_threshold
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn stock_quantity(&self) -> Quantity {
        Quantity::new(self.stock, self.unit)
    }

    pub fn needs_restock(&self) -> bool {
        self.stock <= self.restock_threshold
    }

    /// Decrement stock by `amount` (in the stocking unit) only if enough is on hand.
    ///
    /// Returns `false` and leaves stock untouched when the guard fails.
    pub fn try_decrement(&mut self, amount: Decimal, at: DateTime<Utc>) -> bool {
        if amount < Decimal::ZERO || self.stock < amount {
            return false;
        }
        self.stock -= amount;
        self.updated_at = at;
        true
    }

    /// Increase stock by `amount` (in the stocking unit).
    pub fn increment(&mut self, amount: Decimal, at: DateTime<Utc>) -> DomainResult<()> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("restock amount must be positive"));
        }
        self.stock = self
            .stock
            .checked_add(amount)
            .ok_or_else(|| DomainError::validation("restock amount exceeds the representable range"))?;
        self.updated_at = at;
        Ok(())
    }
}

impl Entity for Ingredient {
    type Id = IngredientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// Ingredients at or below their restock threshold.
pub fn low_stock(ingredients: &[Ingredient]) -> Vec<&Ingredient> {
    ingredients.iter().filter(|i| i.needs_restock()).collect()
}
