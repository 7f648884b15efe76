//! Order Aggregate
//!
//! Orders are snapshots: item name, image, and unit price are copied from the
//! catalog at checkout time so later catalog edits do not rewrite history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::Cart;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub order_id: Uuid,
    pub product_id: String,
    pub name: String,
    pub image: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = OrderError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("unknown order status: {0}")]
    UnknownStatus(String),
}

impl Order {
    /// Builds a pending order from the cart's current lines.
    pub fn from_cart(user_id: Uuid, cart: &Cart) -> Result<Self, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::NoItems);
        }
        let id = Uuid::now_v7();
        let items = cart
            .lines()
            .iter()
            .map(|line| OrderItem {
                order_id: id,
                product_id: line.product.id.clone(),
                name: line.product.name.clone(),
                image: line.product.image.clone(),
                quantity: line.quantity as i32,
                unit_price: line.product.price,
            })
            .collect();
        Ok(Self {
            id,
            order_number: format!("ORD-{:08}", rand::random::<u32>() % 100_000_000),
            user_id,
            status: OrderStatus::Pending,
            total: cart.total_price().amount(),
            currency: cart.currency().to_string(),
            created_at: Utc::now(),
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Product;

    #[test]
    fn test_order_snapshots_cart() {
        let mut cart = Cart::new("USD");
        cart.add_product(Product::new("P1", "Widget", "", "w.jpg", "Misc", 4.0, Decimal::new(1999, 2), 5));
        cart.set_quantity("P1", 2);
        let order = Order::from_cart(Uuid::new_v4(), &cart).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Decimal::new(3998, 2));
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[0].order_id, order.id);
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let cart = Cart::new("USD");
        assert!(matches!(Order::from_cart(Uuid::new_v4(), &cart), Err(OrderError::NoItems)));
    }

    #[test]
    fn test_status_round_trip() {
        let status = OrderStatus::try_from("processing".to_string()).unwrap();
        assert_eq!(status.as_str(), "processing");
        assert!(OrderStatus::try_from("shipped".to_string()).is_err());
    }
}
