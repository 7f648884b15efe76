//! Catalog provider
//!
//! Supplies the ordered product list the filter engine and cart consume.
//! Loaded once; a failed load is a blocking, user-visible state and no
//! partial catalog is ever exposed. Retry is a page reload, not automatic.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::domain::aggregates::Product;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogState {
    Loading,
    Ready,
    Failed(String),
}

pub struct CatalogProvider {
    products: Vec<Product>,
    state: CatalogState,
}

impl Default for CatalogProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogProvider {
    pub fn new() -> Self {
        Self { products: vec![], state: CatalogState::Loading }
    }

    /// A provider that is ready with a fixed product list.
    pub fn from_products(products: Vec<Product>) -> Self {
        Self { products, state: CatalogState::Ready }
    }

    pub async fn load(&mut self, pool: &PgPool) {
        match sqlx::query_as::<_, Product>(
            "SELECT id, name, description, image, category, rating, price, stock \
             FROM products ORDER BY position",
        )
        .fetch_all(pool)
        .await
        {
            Ok(products) => {
                tracing::info!("catalog loaded: {} products", products.len());
                self.products = products;
                self.state = CatalogState::Ready;
            }
            Err(e) => {
                tracing::error!("catalog load failed: {e}");
                self.products.clear();
                self.state = CatalogState::Failed(e.to_string());
            }
        }
    }

    /// The product list. Not complete while loading and not authoritative
    /// after a failed load; check the flags first.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn is_loading(&self) -> bool {
        self.state == CatalogState::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            CatalogState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Category selector values: "All" first, then each label in catalog
    /// order, first occurrence wins.
    pub fn categories(&self) -> Vec<String> {
        let mut categories = vec!["All".to_string()];
        for product in &self.products {
            if !categories.contains(&product.category) {
                categories.push(product.category.clone());
            }
        }
        categories
    }
}

/// Built-in demo catalog, also used as a convenient test fixture.
pub fn sample_catalog() -> Vec<Product> {
    vec![
        Product::new(
            "1",
            "Wireless Bluetooth Headphones",
            "Premium wireless headphones with noise cancellation",
            "https://images.unsplash.com/photo-1505740420928-5e560c06d30e?w=400&h=400&fit=crop",
            "Electronics",
            4.5,
            Decimal::new(19999, 2),
            25,
        ),
        Product::new(
            "2",
            "Smart Fitness Watch",
            "Advanced fitness tracking with heart rate monitor",
            "https://images.unsplash.com/photo-1523275335684-37898b6baf30?w=400&h=400&fit=crop",
            "Electronics",
            4.8,
            Decimal::new(29999, 2),
            15,
        ),
        Product::new(
            "3",
            "Minimalist Desk Lamp",
            "Modern LED desk lamp with adjustable brightness",
            "https://images.unsplash.com/photo-1507473885765-e6ed057f782c?w=400&h=400&fit=crop",
            "Home",
            4.3,
            Decimal::new(8999, 2),
            40,
        ),
        Product::new(
            "4",
            "Premium Coffee Beans",
            "Single-origin coffee beans, medium roast",
            "https://images.unsplash.com/photo-1559056199-641a0ac8b55e?w=400&h=400&fit=crop",
            "Food",
            4.7,
            Decimal::new(2499, 2),
            100,
        ),
        Product::new(
            "5",
            "Ergonomic Office Chair",
            "Comfortable office chair with lumbar support",
            "https://images.unsplash.com/photo-1586023492125-27b2c045efd7?w=400&h=400&fit=crop",
            "Furniture",
            4.6,
            Decimal::new(44999, 2),
            8,
        ),
        Product::new(
            "6",
            "Organic Skincare Set",
            "Natural skincare routine for all skin types",
            "https://images.unsplash.com/photo-1556228578-8c89e6adf883?w=400&h=400&fit=crop",
            "Beauty",
            4.4,
            Decimal::new(7999, 2),
            30,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_provider_is_loading() {
        let provider = CatalogProvider::new();
        assert!(provider.is_loading());
        assert!(provider.products().is_empty());
        assert!(provider.error().is_none());
    }

    #[test]
    fn test_categories_keep_catalog_order() {
        let provider = CatalogProvider::from_products(sample_catalog());
        assert!(!provider.is_loading());
        assert_eq!(
            provider.categories(),
            vec!["All", "Electronics", "Home", "Food", "Furniture", "Beauty"]
        );
    }
}
