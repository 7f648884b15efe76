//! Aggregates module
pub mod cart;
pub mod order;
pub mod product;

pub use cart::{Cart, CartLine};
pub use order::{Order, OrderError, OrderItem, OrderStatus};
pub use product::Product;
