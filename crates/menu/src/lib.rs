//! Menu domain module.
//!
//! Menu items and the recipes (bills of materials) that tie them to stocked
//! ingredients. Pure domain logic: no IO, no storage.

pub mod catalog;
pub mod recipe;

pub use catalog::{Menu, MenuItem, MenuLoadError, RecipeCatalog};
pub use recipe::{Recipe, RecipeIngredient};
