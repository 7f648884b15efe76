//! Cart store
//!
//! Owns the in-memory cart, the session identity, and the one persistence
//! backend that identity selects. All mutation goes through the store; the
//! in-memory cart updates first and the backend write follows. A failed write
//! is logged and reported as a non-blocking event, never rolled back, so the
//! UI keeps the state the user saw and divergence heals on the next reload.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, Order, Product};
use crate::domain::events::CartEvent;
use crate::domain::value_objects::Money;
use crate::persistence::{CartPersistence, LocalCartStore};
use crate::{StorefrontError, Result};

/// The principal that owns the cart's canonical storage location. The only
/// transition is anonymous to authenticated; sign-out does not migrate back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionIdentity {
    Anonymous { session_id: String },
    Authenticated { user_id: Uuid },
}

impl SessionIdentity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Authenticated { user_id } => Some(*user_id),
            Self::Anonymous { .. } => None,
        }
    }
}

pub struct CartStore {
    session: SessionIdentity,
    cart: Cart,
    backend: Box<dyn CartPersistence>,
    events: Vec<CartEvent>,
}

impl CartStore {
    /// Constructs the store and populates the cart from its backend. A failed
    /// read degrades to an empty cart rather than an error.
    pub async fn open(session: SessionIdentity, backend: Box<dyn CartPersistence>, currency: &str) -> Self {
        let cart = match backend.load().await {
            Ok(lines) => Cart::from_lines(lines, currency),
            Err(e) => {
                tracing::error!("cart load failed, starting empty: {e}");
                Cart::new(currency)
            }
        };
        Self { session, cart, backend, events: vec![] }
    }

    pub fn session(&self) -> &SessionIdentity { &self.session }
    pub fn lines(&self) -> &[CartLine] { self.cart.lines() }
    pub fn is_empty(&self) -> bool { self.cart.is_empty() }
    pub fn total_items(&self) -> u64 { self.cart.total_items() }
    pub fn total_price(&self) -> Money { self.cart.total_price() }

    /// Drains pending notification events (add confirmations, sync failures).
    pub fn take_events(&mut self) -> Vec<CartEvent> {
        std::mem::take(&mut self.events)
    }

    /// Adds one unit of `product` and persists the full cart. The
    /// confirmation event fires regardless of the persist outcome.
    pub async fn add_item(&mut self, product: Product) {
        let event = CartEvent::ItemAdded { product_id: product.id.clone(), name: product.name.clone() };
        self.cart.add_product(product);
        self.events.push(event);
        self.persist().await;
    }

    /// Sets a line's quantity; `<= 0` removes the line. Unknown ids are a
    /// no-op and skip the persist.
    pub async fn set_quantity(&mut self, product_id: &str, quantity: i64) {
        if self.cart.set_quantity(product_id, quantity) {
            self.persist().await;
        }
    }

    pub async fn remove_item(&mut self, product_id: &str) {
        if self.cart.remove(product_id) {
            self.events.push(CartEvent::ItemRemoved { product_id: product_id.to_string() });
            self.persist().await;
        }
    }

    pub async fn clear(&mut self) {
        self.cart.clear();
        self.events.push(CartEvent::Cleared);
        self.persist().await;
    }

    /// Migrates a guest cart to an authenticated backend: guest lines are
    /// upserted remotely (last-write-wins on quantity), the remote line set is
    /// re-read as the new source of truth, and only then is the old local
    /// copy cleared. On failure the store stays on its current backend, so
    /// the user keeps a working guest cart.
    pub async fn login(&mut self, user_id: Uuid, remote: Box<dyn CartPersistence>) -> Result<()> {
        if self.session.is_authenticated() {
            // Repeated sign-in (double submit, client retry): the cart
            // already lives remotely. Re-running the migration would merge
            // the lines and then clear them out of the same rows, wiping the
            // remote cart. Refresh from the current backend instead.
            match self.backend.load().await {
                Ok(lines) => {
                    let currency = self.cart.currency().to_string();
                    self.cart = Cart::from_lines(lines, &currency);
                }
                Err(e) => tracing::error!("cart reload failed, keeping in-memory state: {e}"),
            }
            return Ok(());
        }
        remote
            .merge(self.cart.lines())
            .await
            .map_err(StorefrontError::MigrationFailed)?;
        let lines = remote.load().await.map_err(StorefrontError::MigrationFailed)?;
        if let Err(e) = self.backend.clear().await {
            tracing::warn!("guest cart slot not cleared after migration: {e}");
        }
        let currency = self.cart.currency().to_string();
        self.cart = Cart::from_lines(lines, &currency);
        self.backend = remote;
        self.session = SessionIdentity::Authenticated { user_id };
        Ok(())
    }

    /// Checkout entry point: builds a pending order from the current lines.
    /// Guests must sign in first; the caller persists the order and then
    /// clears the cart.
    pub fn begin_checkout(&self) -> Result<Order> {
        let Some(user_id) = self.session.user_id() else {
            return Err(StorefrontError::SignInRequired);
        };
        Order::from_cart(user_id, &self.cart).map_err(|_| StorefrontError::EmptyCart)
    }

    async fn persist(&mut self) {
        if let Err(e) = self.backend.replace(self.cart.lines()).await {
            tracing::error!("cart persist failed, in-memory state kept: {e}");
            self.events.push(CartEvent::SyncFailed { reason: e.to_string() });
        }
    }
}

/// Server-held cart stores keyed by opaque session id.
///
/// The map lock is held only to look up or insert an entry; each store
/// carries its own lock, so one session's backend call never stalls another
/// session. Lookups allocate nothing for unknown ids, and an emptied guest
/// cart can be released — rebuilding it later yields the same empty cart, so
/// only sessions that still hold something stay resident.
pub struct SessionCarts {
    currency: String,
    carts: Mutex<HashMap<String, Arc<Mutex<CartStore>>>>,
}

impl SessionCarts {
    pub fn new(currency: &str) -> Self {
        Self { currency: currency.to_string(), carts: Mutex::new(HashMap::new()) }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The store for `session` if one is resident. Reads go through this so
    /// an unknown session id does not insert anything.
    pub async fn get(&self, session: &str) -> Option<Arc<Mutex<CartStore>>> {
        self.carts.lock().await.get(session).cloned()
    }

    /// The store for `session`, opening a guest store over a fresh in-memory
    /// slot when absent.
    pub async fn get_or_open(&self, session: &str) -> Arc<Mutex<CartStore>> {
        let mut carts = self.carts.lock().await;
        match carts.entry(session.to_string()) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(v) => {
                let identity = SessionIdentity::Anonymous { session_id: session.to_string() };
                let store =
                    CartStore::open(identity, Box::new(LocalCartStore::in_memory()), &self.currency).await;
                v.insert(Arc::new(Mutex::new(store))).clone()
            }
        }
    }

    /// Drops the entry if it is an emptied guest cart. Authenticated
    /// sessions stay resident: their canonical state is remote and the
    /// session identity lives only in the store.
    pub async fn release_if_idle(&self, session: &str) {
        let mut carts = self.carts.lock().await;
        let Some(entry) = carts.get(session).cloned() else { return };
        // In-use stores are skipped; the next idle check catches them.
        let Ok(store) = entry.try_lock() else { return };
        if store.is_empty() && !store.session().is_authenticated() {
            drop(store);
            carts.remove(session);
        }
    }

    pub async fn resident_sessions(&self) -> usize {
        self.carts.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{LocalCartStore, MemorySlot, StorageSlot};
    use crate::PersistenceError;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    fn product(id: &str, price_cents: i64) -> Product {
        Product::new(id, format!("Product {id}"), "", "", "Misc", 4.0, Decimal::new(price_cents, 2), 10)
    }

    fn guest() -> SessionIdentity {
        SessionIdentity::Anonymous { session_id: "guest-1".to_string() }
    }

    /// Backend whose writes always fail; reads succeed and stay empty.
    struct FailingBackend;

    #[async_trait]
    impl CartPersistence for FailingBackend {
        async fn load(&self) -> std::result::Result<Vec<CartLine>, PersistenceError> {
            Ok(vec![])
        }
        async fn replace(&self, _: &[CartLine]) -> std::result::Result<(), PersistenceError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "backend down").into())
        }
        async fn merge(&self, _: &[CartLine]) -> std::result::Result<(), PersistenceError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "backend down").into())
        }
        async fn clear(&self) -> std::result::Result<(), PersistenceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_add_persists_and_reloads() {
        let slot = MemorySlot::new();
        let backend = LocalCartStore::new(Box::new(slot.clone()));
        let mut store = CartStore::open(guest(), Box::new(backend), "USD").await;
        store.add_item(product("A", 1999)).await;
        store.add_item(product("A", 1999)).await;

        let reopened = CartStore::open(guest(), Box::new(LocalCartStore::new(Box::new(slot))), "USD").await;
        assert_eq!(reopened.lines().len(), 1);
        assert_eq!(reopened.lines()[0].quantity, 2);
        assert_eq!(reopened.total_price().amount(), Decimal::new(3998, 2));
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_memory_and_raises_event() {
        let mut store = CartStore::open(guest(), Box::new(FailingBackend), "USD").await;
        store.add_item(product("A", 1000)).await;

        assert_eq!(store.total_items(), 1);
        let events = store.take_events();
        assert!(matches!(events[0], CartEvent::ItemAdded { .. }));
        assert!(matches!(events[1], CartEvent::SyncFailed { .. }));
        assert!(store.take_events().is_empty());
    }

    #[tokio::test]
    async fn test_login_migrates_guest_lines() {
        let local_slot = MemorySlot::new();
        let remote_slot = MemorySlot::new();
        let mut store = CartStore::open(
            guest(),
            Box::new(LocalCartStore::new(Box::new(local_slot.clone()))),
            "USD",
        )
        .await;
        store.add_item(product("A", 1000)).await;
        store.add_item(product("A", 1000)).await;
        store.add_item(product("B", 500)).await;

        let user_id = Uuid::new_v4();
        let remote = LocalCartStore::new(Box::new(remote_slot.clone()));
        store.login(user_id, Box::new(remote)).await.unwrap();

        assert_eq!(store.session(), &SessionIdentity::Authenticated { user_id });
        let mut pairs: Vec<(String, u32)> =
            store.lines().iter().map(|l| (l.product.id.clone(), l.quantity)).collect();
        pairs.sort();
        assert_eq!(pairs, vec![("A".to_string(), 2), ("B".to_string(), 1)]);

        // Guest slot is cleared, remote now holds the cart.
        assert!(local_slot.read().unwrap().is_none());
        let remote_lines = LocalCartStore::new(Box::new(remote_slot)).load().await.unwrap();
        assert_eq!(remote_lines.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_guest_cart_usable() {
        let mut store = CartStore::open(guest(), Box::new(LocalCartStore::in_memory()), "USD").await;
        store.add_item(product("A", 1000)).await;

        let err = store.login(Uuid::new_v4(), Box::new(FailingBackend)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::MigrationFailed(_)));
        assert!(!store.session().is_authenticated());
        assert_eq!(store.total_items(), 1);
    }

    #[tokio::test]
    async fn test_repeated_login_keeps_remote_cart() {
        let remote_slot = MemorySlot::new();
        let mut store = CartStore::open(guest(), Box::new(LocalCartStore::in_memory()), "USD").await;
        store.add_item(product("A", 1000)).await;

        let user_id = Uuid::new_v4();
        store
            .login(user_id, Box::new(LocalCartStore::new(Box::new(remote_slot.clone()))))
            .await
            .unwrap();
        // Client retry: a second login builds a fresh backend over the same
        // remote rows. It must not re-run the migration and wipe them.
        store
            .login(user_id, Box::new(LocalCartStore::new(Box::new(remote_slot.clone()))))
            .await
            .unwrap();

        assert_eq!(store.session(), &SessionIdentity::Authenticated { user_id });
        assert_eq!(store.total_items(), 1);
        let remote_lines = LocalCartStore::new(Box::new(remote_slot)).load().await.unwrap();
        assert_eq!(remote_lines.len(), 1);
        assert_eq!(remote_lines[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_unknown_session_lookup_allocates_nothing() {
        let carts = SessionCarts::new("USD");
        assert!(carts.get("s1").await.is_none());
        assert_eq!(carts.resident_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_emptied_guest_cart_is_released() {
        let carts = SessionCarts::new("USD");
        let handle = carts.get_or_open("s1").await;
        handle.lock().await.add_item(product("A", 1000)).await;
        carts.release_if_idle("s1").await;
        assert_eq!(carts.resident_sessions().await, 1); // still holds a line

        handle.lock().await.clear().await;
        carts.release_if_idle("s1").await;
        assert_eq!(carts.resident_sessions().await, 0);

        // Rebuilt on demand as the same empty guest cart.
        let reopened = carts.get_or_open("s1").await;
        assert!(reopened.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_authenticated_session_stays_resident() {
        let carts = SessionCarts::new("USD");
        let handle = carts.get_or_open("s1").await;
        handle
            .lock()
            .await
            .login(Uuid::new_v4(), Box::new(LocalCartStore::in_memory()))
            .await
            .unwrap();
        carts.release_if_idle("s1").await;
        assert_eq!(carts.resident_sessions().await, 1);
    }

    #[tokio::test]
    async fn test_checkout_requires_sign_in_and_items() {
        let mut store = CartStore::open(guest(), Box::new(LocalCartStore::in_memory()), "USD").await;
        store.add_item(product("A", 1000)).await;
        assert!(matches!(store.begin_checkout(), Err(StorefrontError::SignInRequired)));

        store.login(Uuid::new_v4(), Box::new(LocalCartStore::in_memory())).await.unwrap();
        let order = store.begin_checkout().unwrap();
        assert_eq!(order.total, Decimal::new(1000, 2));

        store.clear().await;
        assert!(matches!(store.begin_checkout(), Err(StorefrontError::EmptyCart)));
    }
}
