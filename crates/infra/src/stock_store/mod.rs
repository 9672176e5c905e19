//! Stock storage adapters.
//!
//! Both adapters implement [`StockRepository`](larder_inventory::StockRepository)
//! and [`OrderWriter`](crate::placement::OrderWriter), so order placement can run
//! against either without change.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryStockRepository, InMemoryStockTransaction};
pub use postgres::{PgStockTransaction, PostgresStockRepository};
