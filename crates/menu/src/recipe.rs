use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, IngredientId, MeasurementUnit, Quantity, RecipeId};

/// One line of a recipe: how much of an ingredient a single portion consumes.
///
/// The unit is the recipe's own unit of measure and may differ from the
/// ingredient's stocking unit, as long as both belong to the same unit group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    ingredient_id: IngredientId,
    quantity: Decimal,
    unit: MeasurementUnit,
}

impl RecipeIngredient {
    pub fn new(
        ingredient_id: IngredientId,
        quantity: Decimal,
        unit: MeasurementUnit,
    ) -> DomainResult<Self> {
        let line = Self {
            ingredient_id,
            quantity,
            unit,
        };
        line.validate()?;
        Ok(line)
    }

    pub fn ingredient_id(&self) -> IngredientId {
        self.ingredient_id
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn unit(&self) -> MeasurementUnit {
        self.unit
    }

    pub fn per_portion(&self) -> Quantity {
        Quantity::new(self.quantity, self.unit)
    }

    /// Amount needed for `portions` portions, still in the recipe's unit.
    ///
    /// `None` when the product does not fit in a `Decimal`.
    pub fn required_for(&self, portions: u32) -> Option<Decimal> {
        self.quantity.checked_mul(Decimal::from(portions))
    }

    pub(crate) fn validate(&self) -> DomainResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "recipe quantity for ingredient {} must be positive",
                self.ingredient_id
            )));
        }
        Ok(())
    }
}

/// Recipe: the ordered ingredient list of exactly one menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    id: RecipeId,
    name: String,
    #[serde(default)]
    ingredients: Vec<RecipeIngredient>,
}

impl Recipe {
    /// Build a recipe. An empty ingredient list is accepted here; whether it can
    /// be fulfilled is decided by the inventory engine.
    pub fn new(
        id: RecipeId,
        name: impl Into<String>,
        ingredients: Vec<RecipeIngredient>,
    ) -> DomainResult<Self> {
        let recipe = Self {
            id,
            name: name.into(),
            ingredients,
        };
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn id(&self) -> RecipeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ingredients(&self) -> &[RecipeIngredient] {
        &self.ingredients
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }

    pub(crate) fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("recipe name cannot be empty"));
        }
        for line in &self.ingredients {
            line.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn required_for_scales_by_portions() {
        let line =
            RecipeIngredient::new(IngredientId::new(), dec!(0.25), MeasurementUnit::Kilogram)
                .unwrap();
        assert_eq!(line.required_for(3), Some(dec!(0.75)));

        let huge = RecipeIngredient::new(IngredientId::new(), Decimal::MAX, MeasurementUnit::Gram)
            .unwrap();
        assert_eq!(huge.required_for(1), Some(Decimal::MAX));
        assert_eq!(huge.required_for(2), None);
        assert_eq!(line.per_portion().to_string(), "0.25 kg");
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let err = RecipeIngredient::new(IngredientId::new(), dec!(0), MeasurementUnit::Gram)
            .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("must be positive") => {}
            other => panic!("Expected validation error, got {other:?}"),
        }
        assert!(RecipeIngredient::new(IngredientId::new(), dec!(-1), MeasurementUnit::Gram).is_err());
    }

    #[test]
    fn blank_recipe_name_is_rejected() {
        assert!(Recipe::new(RecipeId::new(), "  ", vec![]).is_err());
    }

    #[test]
    fn empty_recipe_is_constructible() {
        let recipe = Recipe::new(RecipeId::new(), "Bottled Water", vec![]).unwrap();
        assert!(recipe.is_empty());
    }
}
