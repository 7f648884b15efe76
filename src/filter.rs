//! Filter engine
//!
//! Pure derivation of the visible product list from catalog, category
//! selector, and free-text query. No ranking: results keep catalog order.

use crate::domain::aggregates::Product;

/// Category selector. `All` is the identity filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl From<String> for CategoryFilter {
    fn from(value: String) -> Self {
        if value.is_empty() || value == "All" {
            Self::All
        } else {
            Self::Named(value)
        }
    }
}

impl CategoryFilter {
    fn matches(&self, product: &Product) -> bool {
        match self {
            Self::All => true,
            Self::Named(category) => product.category == *category,
        }
    }
}

/// Filters `products` by category, then by case-insensitive substring match
/// against name or description. An empty query matches everything. An empty
/// result is a normal value, not an error.
pub fn filter_products<'a>(
    products: &'a [Product],
    category: &CategoryFilter,
    query: &str,
) -> Vec<&'a Product> {
    let needle = query.trim().to_lowercase();
    products
        .iter()
        .filter(|p| category.matches(p))
        .filter(|p| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Holds the two filter intents so the presentation layer can mutate one
/// input and re-derive the view.
#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    query: String,
    category: CategoryFilter,
}

impl ProductFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = CategoryFilter::from(category.into());
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn category(&self) -> &CategoryFilter {
        &self.category
    }

    pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        filter_products(products, &self.category, &self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn mugs() -> Vec<Product> {
        vec![
            Product::new("1", "Red Mug", "Ceramic mug", "", "Drinkware", 4.0, Decimal::new(999, 2), 5),
            Product::new("2", "Blue Cup", "Ceramic cup", "", "Drinkware", 4.0, Decimal::new(899, 2), 5),
            Product::new("3", "Desk Lamp", "A mug-shaped lamp", "", "Home", 4.0, Decimal::new(1999, 2), 5),
        ]
    }

    #[test]
    fn test_query_matches_name_case_insensitive() {
        let catalog = mugs();
        let result = filter_products(&catalog, &CategoryFilter::All, "mug");
        let names: Vec<&str> = result.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Red Mug", "Desk Lamp"]); // lamp matches on description
    }

    #[test]
    fn test_category_restricts_query() {
        let catalog = mugs();
        let result = filter_products(&catalog, &CategoryFilter::Named("Drinkware".into()), "mug");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Red Mug");
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let catalog = mugs();
        let result = filter_products(&catalog, &CategoryFilter::Named("Garden".into()), "");
        assert!(result.is_empty());
    }

    #[test]
    fn test_all_and_empty_query_are_identity() {
        let catalog = mugs();
        assert_eq!(filter_products(&catalog, &CategoryFilter::All, "").len(), 3);
        assert_eq!(CategoryFilter::from("All".to_string()), CategoryFilter::All);
        assert_eq!(CategoryFilter::from(String::new()), CategoryFilter::All);
    }

    #[test]
    fn test_intents_re_derive_view() {
        let catalog = mugs();
        let mut filter = ProductFilter::new();
        filter.set_query("CERAMIC");
        assert_eq!(filter.apply(&catalog).len(), 2);
        filter.set_category("Home");
        assert!(filter.apply(&catalog).is_empty());
    }
}
