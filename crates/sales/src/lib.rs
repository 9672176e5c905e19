//! Sales orders domain module.
//!
//! Orders as seen by the kitchen: which menu items were bought and how many.
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{Order, OrderItem};
