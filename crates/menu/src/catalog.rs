use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use larder_core::{DomainError, DomainResult, Entity, MenuItemId};

use crate::recipe::Recipe;

/// A sellable menu item, optionally backed by a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    id: MenuItemId,
    name: String,
    #[serde(default)]
    recipe: Option<Recipe>,
}

impl MenuItem {
    pub fn new(id: MenuItemId, name: impl Into<String>) -> DomainResult<Self> {
        let item = Self {
            id,
            name: name.into(),
            recipe: None,
        };
        item.validate()?;
        Ok(item)
    }

    pub fn with_recipe(mut self, recipe: Recipe) -> Self {
        self.recipe = Some(recipe);
        self
    }

    pub fn id_typed(&self) -> MenuItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("menu item name cannot be empty"));
        }
        if let Some(recipe) = &self.recipe {
            recipe.validate()?;
        }
        Ok(())
    }
}

impl Entity for MenuItem {
    type Id = MenuItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// Read-only lookup of menu items (and through them, recipes).
///
/// The inventory engine only needs this view; callers load recipes eagerly
/// before invoking it.
pub trait RecipeCatalog {
    fn menu_item(&self, id: &MenuItemId) -> Option<&MenuItem>;
}

impl<S> RecipeCatalog for Arc<S>
where
    S: RecipeCatalog + ?Sized,
{
    fn menu_item(&self, id: &MenuItemId) -> Option<&MenuItem> {
        (**self).menu_item(id)
    }
}

impl RecipeCatalog for HashMap<MenuItemId, MenuItem> {
    fn menu_item(&self, id: &MenuItemId) -> Option<&MenuItem> {
        self.get(id)
    }
}

#[derive(Debug, Error)]
pub enum MenuLoadError {
    #[error("failed to parse menu: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// In-memory menu: the set of menu items a kitchen can sell.
#[derive(Debug, Clone, Default)]
pub struct Menu {
    items: HashMap<MenuItemId, MenuItem>,
}

impl Menu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item; ids must be unique within a menu.
    pub fn add(&mut self, item: MenuItem) -> DomainResult<()> {
        if self.items.contains_key(&item.id) {
            return Err(DomainError::validation(format!(
                "duplicate menu item id {}",
                item.id
            )));
        }
        self.items.insert(item.id, item);
        Ok(())
    }

    /// Load a menu from a JSON array of menu items.
    ///
    /// ```json
    /// [{ "id": "…", "name": "Margherita",
    ///    "recipe": { "id": "…", "name": "Margherita",
    ///                "ingredients": [{ "ingredient_id": "…", "quantity": "0.25", "unit": "kg" }] } }]
    /// ```
    pub fn from_json(json: &str) -> Result<Self, MenuLoadError> {
        let items: Vec<MenuItem> = serde_json::from_str(json)?;
        let mut menu = Menu::new();
        for item in items {
            item.validate()?;
            menu.add(item)?;
        }
        Ok(menu)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl RecipeCatalog for Menu {
    fn menu_item(&self, id: &MenuItemId) -> Option<&MenuItem> {
        self.items.get(id)
    }
}
