//! Integration test support for RocketShoes.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p rocketshoes-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_scenarios` - Cart store behaviour against an in-memory catalog
//! - `api_client` - HTTP client and full store against a local catalog server
//!
//! # Helpers
//!
//! - [`StaticCatalog`] - in-memory [`CatalogApi`] with request counters
//! - [`FlakyStorage`] - storage whose writes can be switched off
//! - [`CatalogServer`] - `axum` server speaking the catalog REST API on an
//!   ephemeral port

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use rocketshoes_core::{Product, ProductId, Stock};
use rocketshoes_storefront::api::{ApiError, CatalogApi};
use rocketshoes_storefront::cart::CartStore;
use rocketshoes_storefront::config::CartConfig;
use rocketshoes_storefront::notify::{MemoryNotifier, Notifier};
use rocketshoes_storefront::storage::{KeyValueStorage, MemoryStorage, StorageError};
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

// =============================================================================
// StaticCatalog
// =============================================================================

/// In-memory catalog with configurable stock.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    products: Mutex<HashMap<ProductId, Product>>,
    stock: Mutex<HashMap<ProductId, i64>>,
    stock_calls: AtomicUsize,
    product_calls: AtomicUsize,
}

impl StaticCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product from its catalog JSON, with a stock level.
    #[must_use]
    pub fn with_product(self, json: Value, stock: i64) -> Self {
        let product: Product = serde_json::from_value(json).expect("valid product JSON");
        self.stock.lock().insert(product.id, stock);
        self.products.lock().insert(product.id, product);
        self
    }

    /// Register stock without a catalog entry.
    #[must_use]
    pub fn with_stock(self, id: i32, amount: i64) -> Self {
        self.set_stock(id, amount);
        self
    }

    /// Change the stock level of a product.
    pub fn set_stock(&self, id: i32, amount: i64) {
        self.stock.lock().insert(ProductId::new(id), amount);
    }

    #[must_use]
    pub fn stock_calls(&self) -> usize {
        self.stock_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn product_calls(&self) -> usize {
        self.product_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogApi for StaticCatalog {
    async fn stock(&self, id: ProductId) -> Result<Stock, ApiError> {
        self.stock_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let amount = self
            .stock
            .lock()
            .get(&id)
            .copied()
            .ok_or_else(|| ApiError::NotFound(format!("stock/{id}")))?;
        Ok(Stock { id, amount })
    }

    async fn product(&self, id: ProductId) -> Result<Product, ApiError> {
        self.product_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.products
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("products/{id}")))
    }
}

// =============================================================================
// FlakyStorage
// =============================================================================

/// Memory storage whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    reject_writes: AtomicBool,
}

impl FlakyStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }
}

impl KeyValueStorage for FlakyStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected(key.to_string()));
        }
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key)
    }
}

// =============================================================================
// Store construction
// =============================================================================

/// A store wired to test collaborators, with handles to inspect them.
pub struct TestStore<C, S> {
    pub store: CartStore,
    pub catalog: Arc<C>,
    pub storage: Arc<S>,
    pub notifier: Arc<MemoryNotifier>,
}

impl<C, S> TestStore<C, S>
where
    C: CatalogApi + 'static,
    S: KeyValueStorage + 'static,
{
    /// Load a store from the given catalog and storage.
    pub fn new(catalog: C, storage: S, config: CartConfig) -> Self {
        Self::from_arcs(Arc::new(catalog), Arc::new(storage), config)
    }

    /// Load a store sharing existing catalog and storage handles.
    pub fn from_arcs(catalog: Arc<C>, storage: Arc<S>, config: CartConfig) -> Self {
        let notifier = Arc::new(MemoryNotifier::new());
        let store = CartStore::load(
            Arc::clone(&catalog) as Arc<dyn CatalogApi>,
            Arc::clone(&storage) as Arc<dyn KeyValueStorage>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            config,
        );
        Self {
            store,
            catalog,
            storage,
            notifier,
        }
    }
}

// =============================================================================
// CatalogServer
// =============================================================================

/// Catalog REST API served by `axum` on `127.0.0.1`.
pub struct CatalogServer {
    base_url: Url,
    state: ServerState,
    handle: JoinHandle<()>,
}

/// Shared data behind the test server.
#[derive(Clone, Default)]
pub struct ServerState {
    inner: Arc<ServerInner>,
}

#[derive(Default)]
struct ServerInner {
    products: Mutex<HashMap<i32, Value>>,
    stock: Mutex<HashMap<i32, i64>>,
    product_requests: AtomicUsize,
    stock_requests: AtomicUsize,
    stock_unavailable: AtomicBool,
}

impl ServerState {
    /// Serve `json` at `/products/{id}`. The body is returned as-is.
    pub fn put_product(&self, id: i32, json: Value) {
        self.inner.products.lock().insert(id, json);
    }

    /// Serve `{id, amount}` at `/stock/{id}`.
    pub fn put_stock(&self, id: i32, amount: i64) {
        self.inner.stock.lock().insert(id, amount);
    }

    /// Make `/stock/{id}` answer 500.
    pub fn set_stock_unavailable(&self, unavailable: bool) {
        self.inner
            .stock_unavailable
            .store(unavailable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn product_requests(&self) -> usize {
        self.inner.product_requests.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stock_requests(&self) -> usize {
        self.inner.stock_requests.load(Ordering::SeqCst)
    }
}

impl CatalogServer {
    /// Bind an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state = ServerState::default();
        let app = Router::new()
            .route("/stock/{id}", get(stock_handler))
            .route("/products/{id}", get(product_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let base_url = Url::parse(&format!("http://{addr}/")).expect("server URL");
        Self {
            base_url,
            state,
            handle,
        }
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn state(&self) -> &ServerState {
        &self.state
    }
}

impl Drop for CatalogServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn stock_handler(State(state): State<ServerState>, Path(id): Path<i32>) -> Response {
    state.inner.stock_requests.fetch_add(1, Ordering::SeqCst);

    if state.inner.stock_unavailable.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "stock service unavailable").into_response();
    }

    let amount = state.inner.stock.lock().get(&id).copied();
    amount.map_or_else(
        || StatusCode::NOT_FOUND.into_response(),
        |amount| Json(serde_json::json!({ "id": id, "amount": amount })).into_response(),
    )
}

async fn product_handler(State(state): State<ServerState>, Path(id): Path<i32>) -> Response {
    state.inner.product_requests.fetch_add(1, Ordering::SeqCst);

    let product = state.inner.products.lock().get(&id).cloned();
    product.map_or_else(
        || StatusCode::NOT_FOUND.into_response(),
        |json| Json(json).into_response(),
    )
}
