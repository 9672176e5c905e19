//! Inventory domain module.
//!
//! Ingredients, the stock storage port, and the deduction engine that turns a
//! placed order into guarded stock decrements:
//!
//! ```text
//! Order ──► resolve recipes ──► load ingredient snapshot ──► aggregate requirements
//!                                                                   │
//!                       DeductionReport ◄── conditional decrements ◄┘
//! ```
//!
//! The engine never rolls back on its own. It must run inside a transaction
//! that the caller aborts when any error is returned.

pub mod deduction;
pub mod error;
pub mod ingredient;
pub mod requirements;
pub mod stock;

pub use deduction::{DeductionEngine, DeductionOptions, DeductionReport, StockDeduction};
pub use error::{InventoryError, Shortfall};
pub use ingredient::{Ingredient, low_stock};
pub use requirements::{Requirement, Requirements, aggregate_requirements, referenced_ingredients};
pub use stock::{DecrementOutcome, StockRepository, StockStoreError, StockTransaction};
