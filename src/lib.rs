//! Storefront Service
//!
//! Catalog browsing, cart state, and order history for a small storefront.
//!
//! ## Features
//! - Product catalog with search and category filtering
//! - Session-scoped shopping cart with local or remote persistence
//! - Guest-to-account cart migration on sign-in
//! - Checkout entry point and per-user order history

use thiserror::Error;

pub mod catalog;
pub mod domain;
pub mod filter;
pub mod persistence;
pub mod store;

pub use catalog::CatalogProvider;
pub use domain::aggregates::{Cart, CartLine, Order, OrderItem, Product};
pub use filter::ProductFilter;
pub use persistence::{CartPersistence, LocalCartStore, RemoteCartStore};
pub use store::{CartStore, SessionCarts, SessionIdentity};

// =============================================================================
// Error Types
// =============================================================================

/// Faults raised by a persistence backend (local slot or remote rows).
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage slot error: {0}")]
    Slot(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("product not found")]
    ProductNotFound,

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("cart is empty")]
    EmptyCart,

    #[error("checkout requires a signed-in session")]
    SignInRequired,

    #[error("cart migration failed: {0}")]
    MigrationFailed(#[source] PersistenceError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
