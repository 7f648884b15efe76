//! Storefront HTTP service
//!
//! Thin presentation surface over the catalog provider, filter engine, and
//! cart store. Sessions are keyed by an opaque id the client carries; guest
//! carts live in server-held slots until sign-in migrates them to Postgres.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use storefront::domain::events::CartEvent;
use storefront::domain::value_objects::Money;
use storefront::persistence::{self, RemoteCartStore};
use storefront::store::SessionCarts;
use storefront::{
    CartLine, CartStore, CatalogProvider, Order, Product, ProductFilter, StorefrontError,
};

#[derive(Clone)]
struct AppState {
    db: sqlx::PgPool,
    catalog: Arc<CatalogProvider>,
    carts: Arc<SessionCarts>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&std::env::var("DATABASE_URL")?)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let currency = std::env::var("STOREFRONT_CURRENCY").unwrap_or_else(|_| "USD".to_string());
    let mut catalog = CatalogProvider::new();
    catalog.load(&db).await;
    if let Some(e) = catalog.error() {
        // Serve anyway; browsing degrades to a visible catalog error.
        tracing::error!("starting without catalog: {e}");
    }

    let state = AppState {
        db,
        catalog: Arc::new(catalog),
        carts: Arc::new(SessionCarts::new(&currency)),
    };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/categories", get(list_categories))
        .route("/api/v1/cart/:session", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/:session/items", post(add_item))
        .route("/api/v1/cart/:session/items/:product_id", axum::routing::put(set_quantity).delete(remove_item))
        .route("/api/v1/cart/:session/login", post(login))
        .route("/api/v1/cart/:session/checkout", post(checkout))
        .route("/api/v1/orders/:user_id", get(order_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8083".to_string());
    tracing::info!("storefront listening on 0.0.0.0:{port}");
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?, app).await?;
    Ok(())
}

// =============================================================================
// Error mapping
// =============================================================================

struct ApiError(StorefrontError);

impl From<StorefrontError> for ApiError {
    fn from(e: StorefrontError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StorefrontError::ProductNotFound => StatusCode::NOT_FOUND,
            StorefrontError::SignInRequired => StatusCode::UNAUTHORIZED,
            StorefrontError::EmptyCart => StatusCode::UNPROCESSABLE_ENTITY,
            StorefrontError::CatalogUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StorefrontError::MigrationFailed(_) | StorefrontError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.0.to_string()).into_response()
    }
}

// =============================================================================
// Catalog + filter
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListParams {
    search: Option<String>,
    category: Option<String>,
}

fn ready_catalog(state: &AppState) -> Result<&CatalogProvider, ApiError> {
    if let Some(e) = state.catalog.error() {
        return Err(StorefrontError::CatalogUnavailable(e.to_string()).into());
    }
    Ok(state.catalog.as_ref())
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let catalog = ready_catalog(&state)?;
    let mut filter = ProductFilter::new();
    if let Some(q) = params.search {
        filter.set_query(q);
    }
    if let Some(c) = params.category {
        filter.set_category(c);
    }
    Ok(Json(filter.apply(catalog.products()).into_iter().cloned().collect()))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(ready_catalog(&state)?.categories()))
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Serialize)]
struct CartView {
    lines: Vec<CartLine>,
    total_items: u64,
    total_price: Money,
    notifications: Vec<CartEvent>,
}

fn view(store: &mut CartStore) -> CartView {
    CartView {
        lines: store.lines().to_vec(),
        total_items: store.total_items(),
        total_price: store.total_price(),
        notifications: store.take_events(),
    }
}

fn empty_view(currency: &str) -> CartView {
    CartView {
        lines: vec![],
        total_items: 0,
        total_price: Money::zero(currency),
        notifications: vec![],
    }
}

async fn get_cart(State(state): State<AppState>, Path(session): Path<String>) -> Json<CartView> {
    // Reads never allocate a session entry.
    match state.carts.get(&session).await {
        Some(handle) => {
            let mut store = handle.lock().await;
            Json(view(&mut store))
        }
        None => Json(empty_view(state.carts.currency())),
    }
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    product_id: String,
}

async fn add_item(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let product = ready_catalog(&state)?
        .products()
        .iter()
        .find(|p| p.id == req.product_id)
        .cloned()
        .ok_or(StorefrontError::ProductNotFound)?;
    let handle = state.carts.get_or_open(&session).await;
    let mut store = handle.lock().await;
    store.add_item(product).await;
    Ok(Json(view(&mut store)))
}

#[derive(Debug, Deserialize)]
struct SetQuantityRequest {
    quantity: i64,
}

async fn set_quantity(
    State(state): State<AppState>,
    Path((session, product_id)): Path<(String, String)>,
    Json(req): Json<SetQuantityRequest>,
) -> Json<CartView> {
    let Some(handle) = state.carts.get(&session).await else {
        return Json(empty_view(state.carts.currency()));
    };
    let cart_view = {
        let mut store = handle.lock().await;
        store.set_quantity(&product_id, req.quantity).await;
        view(&mut store)
    };
    state.carts.release_if_idle(&session).await;
    Json(cart_view)
}

async fn remove_item(
    State(state): State<AppState>,
    Path((session, product_id)): Path<(String, String)>,
) -> Json<CartView> {
    let Some(handle) = state.carts.get(&session).await else {
        return Json(empty_view(state.carts.currency()));
    };
    let cart_view = {
        let mut store = handle.lock().await;
        store.remove_item(&product_id).await;
        view(&mut store)
    };
    state.carts.release_if_idle(&session).await;
    Json(cart_view)
}

async fn clear_cart(State(state): State<AppState>, Path(session): Path<String>) -> Json<CartView> {
    let Some(handle) = state.carts.get(&session).await else {
        return Json(empty_view(state.carts.currency()));
    };
    let cart_view = {
        let mut store = handle.lock().await;
        store.clear().await;
        view(&mut store)
    };
    state.carts.release_if_idle(&session).await;
    Json(cart_view)
}

// =============================================================================
// Session transition + checkout + history
// =============================================================================

#[derive(Debug, Deserialize)]
struct LoginRequest {
    user_id: Uuid,
}

async fn login(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<CartView>, ApiError> {
    let handle = state.carts.get_or_open(&session).await;
    let mut store = handle.lock().await;
    let remote = RemoteCartStore::new(state.db.clone(), req.user_id);
    store.login(req.user_id, Box::new(remote)).await?;
    Ok(Json(view(&mut store)))
}

async fn checkout(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    // An unknown session is a guest with nothing in the cart.
    let Some(handle) = state.carts.get(&session).await else {
        return Err(StorefrontError::SignInRequired.into());
    };
    let mut store = handle.lock().await;
    let order = store.begin_checkout()?;
    persistence::insert_order(&state.db, &order)
        .await
        .map_err(StorefrontError::from)?;
    store.clear().await;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn order_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = persistence::orders_for_user(&state.db, user_id)
        .await
        .map_err(StorefrontError::from)?;
    Ok(Json(orders))
}
