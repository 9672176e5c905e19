//! Infrastructure layer: configuration, stock storage adapters, and the order
//! placement workflow that ties them to the inventory engine.

pub mod bootstrap;
pub mod config;
pub mod placement;
pub mod stock_store;


pub use bootstrap::{StockBackend, bootstrap};
pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use placement::{OrderPlacement, OrderWriter, PlacementError};
pub use stock_store::{InMemoryStockRepository, PostgresStockRepository};
