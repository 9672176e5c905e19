//! `larder-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the menu, sales and
//! inventory crates: identifiers, the domain error model, and measurement units.

pub mod entity;
pub mod error;
pub mod id;
pub mod unit;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{IngredientId, MenuItemId, OrderId, RecipeId};
pub use unit::{MeasurementUnit, Quantity, UnitError, UnitGroup};
pub use value_object::ValueObject;
