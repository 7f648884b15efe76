//! Cart Aggregate
//!
//! Holds at most one line per product id. Line order is insertion order and
//! only matters for display. Totals are derived on read; nothing is cached.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::Product;
use crate::domain::value_objects::Money;

/// One product-to-quantity association. `quantity >= 1` while the line
/// exists; a quantity that would drop to zero removes the line instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self, currency: &str) -> Money {
        Money::new(self.product.price, currency).multiply(self.quantity)
    }
}

#[derive(Clone, Debug)]
pub struct Cart {
    lines: Vec<CartLine>,
    currency: String,
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { lines: vec![], currency: currency.to_string() }
    }

    pub fn from_lines(lines: Vec<CartLine>, currency: &str) -> Self {
        let mut cart = Self::new(currency);
        for line in lines {
            cart.merge_line(line);
        }
        cart
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line_count(&self) -> usize { self.lines.len() }

    /// Adds one unit of `product`: increments the existing line or appends a
    /// new one with quantity 1. Stock is deliberately not checked here.
    pub fn add_product(&mut self, product: Product) {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.product.id == product.id) {
            existing.quantity = existing.quantity.saturating_add(1);
        } else {
            self.lines.push(CartLine { product, quantity: 1 });
        }
    }

    /// Replaces a line's quantity. `quantity <= 0` removes the line; an
    /// unknown product id is a no-op. Returns true if the cart changed.
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(product_id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self.lines.iter_mut().find(|l| l.product.id == product_id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Removes the line if present; absent ids are a no-op, not an error.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product.id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) { self.lines.clear(); }

    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn total_price(&self) -> Money {
        self.lines.iter().fold(Money::zero(&self.currency), |acc, l| {
            acc.add(&l.line_total(&self.currency)).unwrap_or(acc)
        })
    }

    // Restores a persisted line, collapsing duplicate product ids so the
    // one-line-per-product invariant holds even for hand-edited payloads.
    fn merge_line(&mut self, line: CartLine) {
        if line.quantity == 0 {
            return;
        }
        if let Some(existing) = self.lines.iter_mut().find(|l| l.product.id == line.product.id) {
            existing.quantity = line.quantity;
        } else {
            self.lines.push(line);
        }
    }
}
