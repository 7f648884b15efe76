//! Product catalog record
//!
//! Products are read-only from the cart's point of view: the catalog owns
//! them, cart lines only hold snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Rating;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub category: String,
    #[sqlx(try_from = "f32")]
    pub rating: Rating,
    /// Unit price, non-negative, in the storefront currency.
    pub price: Decimal,
    pub stock: i32,
}

impl Product {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
        category: impl Into<String>,
        rating: f32,
        price: Decimal,
        stock: i32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            image: image.into(),
            category: category.into(),
            rating: Rating::new(rating),
            price,
            stock: stock.max(0),
        }
    }

    pub fn is_in_stock(&self) -> bool { self.stock > 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_product_record() {
        let p = Product::new("1", "Test Product", "A thing", "img.jpg", "Misc", 4.5, Decimal::new(1999, 2), 3);
        assert!(p.is_in_stock());
        assert_eq!(p.rating.value(), 4.5);
    }
    #[test]
    fn test_stock_floor() {
        let p = Product::new("1", "P", "", "", "Misc", 0.0, Decimal::ZERO, -2);
        assert!(!p.is_in_stock());
        assert_eq!(p.stock, 0);
    }
}
