use serde::Serialize;
use thiserror::Error;

use larder_core::{IngredientId, MenuItemId, Quantity, UnitError};

use crate::stock::StockStoreError;

/// Why an ingredient cannot cover an order, in the ingredient's stocking unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub ingredient_id: IngredientId,
    pub ingredient: String,
    pub required: Quantity,
    pub available: Quantity,
    pub shortfall: Quantity,
}

impl core::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "'{}' requires {}, {} available (short by {})",
            self.ingredient, self.required, self.available, self.shortfall
        )
    }
}

/// Failure of an inventory operation.
///
/// Every variant is terminal for the current order placement attempt; none
/// is retried by the engine.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The menu item is unknown, has no recipe, or its recipe lists no ingredients.
    #[error("no recipe defined for menu item '{menu_item}'")]
    MissingRecipe {
        menu_item_id: MenuItemId,
        menu_item: String,
    },

    #[error("recipe for '{menu_item}' references unknown ingredient {ingredient_id}")]
    MissingIngredient {
        menu_item_id: MenuItemId,
        menu_item: String,
        ingredient_id: IngredientId,
    },

    /// Recipe unit and stocking unit belong to different unit groups.
    #[error("unit mismatch for ingredient '{ingredient}': {source}")]
    UnitMismatch {
        ingredient_id: IngredientId,
        ingredient: String,
        source: UnitError,
    },

    #[error("insufficient stock: {0}")]
    InsufficientStock(Shortfall),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error(transparent)]
    Store(#[from] StockStoreError),
}

impl InventoryError {
    /// True for data/configuration problems (as opposed to stock levels or storage faults).
    pub fn is_definitional(&self) -> bool {
        matches!(
            self,
            InventoryError::MissingRecipe { .. }
                | InventoryError::MissingIngredient { .. }
                | InventoryError::UnitMismatch { .. }
        )
    }
}
