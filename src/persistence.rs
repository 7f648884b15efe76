//! Cart persistence backends
//!
//! A cart has exactly one canonical backend at a time, selected by session
//! identity: a device-scoped storage slot for guests, Postgres rows keyed by
//! user id for signed-in sessions. The store talks to either through
//! [`CartPersistence`] and never branches on which one it holds.

use async_trait::async_trait;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, Order, OrderItem, Product};
use crate::PersistenceError;

#[async_trait]
pub trait CartPersistence: Send + Sync {
    /// Reads the full line set. A missing or unreadable payload is an empty
    /// cart for the local backend; remote faults are real errors.
    async fn load(&self) -> Result<Vec<CartLine>, PersistenceError>;

    /// Replaces the backend's line set with `lines`.
    async fn replace(&self, lines: &[CartLine]) -> Result<(), PersistenceError>;

    /// Upserts `lines` into the backend, last-write-wins on quantity per
    /// product id. Lines already present but not in `lines` are kept.
    async fn merge(&self, lines: &[CartLine]) -> Result<(), PersistenceError>;

    async fn clear(&self) -> Result<(), PersistenceError>;
}

// =============================================================================
// Local backend: one string-keyed slot, serialized JSON array of lines
// =============================================================================

/// A single device-scoped string slot, the shape of browser local storage.
pub trait StorageSlot: Send + Sync {
    fn read(&self) -> std::io::Result<Option<String>>;
    fn write(&self, payload: &str) -> std::io::Result<()>;
    fn clear(&self) -> std::io::Result<()>;
}

/// File-backed slot for a real device.
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageSlot for FileSlot {
    fn read(&self) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, payload: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, payload)
    }

    fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-memory slot for server-held guest sessions and tests. Clones share the
/// same cell.
#[derive(Clone, Default)]
pub struct MemorySlot {
    cell: Arc<Mutex<Option<String>>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageSlot for MemorySlot {
    fn read(&self) -> std::io::Result<Option<String>> {
        Ok(self.cell.lock().expect("slot poisoned").clone())
    }

    fn write(&self, payload: &str) -> std::io::Result<()> {
        *self.cell.lock().expect("slot poisoned") = Some(payload.to_string());
        Ok(())
    }

    fn clear(&self) -> std::io::Result<()> {
        *self.cell.lock().expect("slot poisoned") = None;
        Ok(())
    }
}

pub struct LocalCartStore {
    slot: Box<dyn StorageSlot>,
}

impl LocalCartStore {
    pub fn new(slot: Box<dyn StorageSlot>) -> Self {
        Self { slot }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileSlot::new(path)))
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemorySlot::new()))
    }

    fn read_lines(&self) -> Result<Vec<CartLine>, PersistenceError> {
        let Some(payload) = self.slot.read()? else {
            return Ok(vec![]);
        };
        match serde_json::from_str::<Vec<CartLine>>(&payload) {
            Ok(lines) => Ok(lines),
            Err(e) => {
                // Corruption is recovered silently as an empty cart.
                tracing::warn!("discarding malformed local cart payload: {e}");
                Ok(vec![])
            }
        }
    }
}

#[async_trait]
impl CartPersistence for LocalCartStore {
    async fn load(&self) -> Result<Vec<CartLine>, PersistenceError> {
        self.read_lines()
    }

    async fn replace(&self, lines: &[CartLine]) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(lines)?;
        self.slot.write(&payload)?;
        Ok(())
    }

    async fn merge(&self, lines: &[CartLine]) -> Result<(), PersistenceError> {
        let mut current = self.read_lines()?;
        for incoming in lines {
            match current.iter_mut().find(|l| l.product.id == incoming.product.id) {
                Some(existing) => existing.quantity = incoming.quantity,
                None => current.push(incoming.clone()),
            }
        }
        self.replace(&current).await
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.slot.clear()?;
        Ok(())
    }
}

// =============================================================================
// Remote backend: cart_lines rows keyed (user_id, product_id)
// =============================================================================

pub struct RemoteCartStore {
    pool: PgPool,
    user_id: Uuid,
}

#[derive(sqlx::FromRow)]
struct RemoteLineRow {
    #[sqlx(flatten)]
    product: Product,
    quantity: i32,
}

impl RemoteCartStore {
    pub fn new(pool: PgPool, user_id: Uuid) -> Self {
        Self { pool, user_id }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

#[async_trait]
impl CartPersistence for RemoteCartStore {
    async fn load(&self) -> Result<Vec<CartLine>, PersistenceError> {
        let rows = sqlx::query_as::<_, RemoteLineRow>(
            "SELECT p.id, p.name, p.description, p.image, p.category, p.rating, p.price, p.stock, c.quantity \
             FROM cart_lines c JOIN products p ON p.id = c.product_id \
             WHERE c.user_id = $1 ORDER BY c.added_at",
        )
        .bind(self.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.quantity > 0)
            .map(|r| CartLine { product: r.product, quantity: r.quantity as u32 })
            .collect())
    }

    // Full replace in one transaction, so a fault cannot leave the remote
    // cart emptied with the new lines never written.
    async fn replace(&self, lines: &[CartLine]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(self.user_id)
            .execute(&mut *tx)
            .await?;
        for line in lines {
            sqlx::query(
                "INSERT INTO cart_lines (user_id, product_id, quantity, added_at) VALUES ($1, $2, $3, NOW())",
            )
            .bind(self.user_id)
            .bind(&line.product.id)
            .bind(line.quantity as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn merge(&self, lines: &[CartLine]) -> Result<(), PersistenceError> {
        for line in lines {
            sqlx::query(
                "INSERT INTO cart_lines (user_id, product_id, quantity, added_at) VALUES ($1, $2, $3, NOW()) \
                 ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
            )
            .bind(self.user_id)
            .bind(&line.product.id)
            .bind(line.quantity as i32)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(self.user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Orders
// =============================================================================

pub async fn insert_order(pool: &PgPool, order: &Order) -> Result<(), PersistenceError> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO orders (id, order_number, user_id, status, total, currency, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(order.status.as_str())
    .bind(order.total)
    .bind(&order.currency)
    .bind(order.created_at)
    .execute(&mut *tx)
    .await?;
    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, name, image, quantity, unit_price) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(item.order_id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(&item.image)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    status: String,
    total: rust_decimal::Decimal,
    currency: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, PersistenceError> {
        let status = crate::domain::aggregates::OrderStatus::try_from(self.status)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            status,
            total: self.total,
            currency: self.currency,
            created_at: self.created_at,
            items: vec![],
        })
    }
}

/// Full order history for a user, newest first, items attached.
pub async fn orders_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Order>, PersistenceError> {
    let rows = sqlx::query_as::<_, OrderRow>(
        "SELECT id, order_number, user_id, status, total, currency, created_at \
         FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    let mut orders = rows
        .into_iter()
        .map(OrderRow::into_order)
        .collect::<Result<Vec<_>, _>>()?;
    if orders.is_empty() {
        return Ok(orders);
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT order_id, product_id, name, image, quantity, unit_price \
         FROM order_items WHERE order_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;
    for item in items {
        if let Some(order) = orders.iter_mut().find(|o| o.id == item.order_id) {
            order.items.push(item);
        }
    }
    Ok(orders)
}
