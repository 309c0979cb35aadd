//! The cart store.
//!
//! [`CartStore`] owns the in-memory cart, mirrors it to durable storage after
//! every successful mutation, and validates quantity changes against live
//! stock before committing them.
//!
//! # Consistency
//!
//! - Mutations are serialized by an async mutex held across the stock and
//!   catalog lookups, so overlapping calls cannot lose updates.
//! - The new cart is written to storage before it becomes visible; if the
//!   write fails, memory and storage both keep the previous cart.
//! - Readers never wait on a mutation in flight. They see the last committed
//!   cart through a `watch` channel.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = CartStore::load(catalog, storage, notifier, CartConfig::default());
//!
//! store.add_product(ProductId::new(1)).await?;
//! store
//!     .update_product_amount(UpdateProductAmount::new(ProductId::new(1), 3))
//!     .await?;
//! println!("{} items", store.cart().item_count());
//! ```

use std::sync::Arc;

use rocketshoes_core::{Cart, ProductId, Stock};
use tokio::sync::{Mutex, watch};
use tracing::instrument;

use crate::api::CatalogApi;
use crate::config::CartConfig;
use crate::error::{CartError, CartOperation, Result, add_breadcrumb};
use crate::notify::Notifier;
use crate::storage::{KeyValueStorage, keys};

/// Target quantity for a product already in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateProductAmount {
    pub product_id: ProductId,
    /// Requested amount; zero or negative is ignored.
    pub amount: i64,
}

impl UpdateProductAmount {
    #[must_use]
    pub const fn new(product_id: ProductId, amount: i64) -> Self {
        Self { product_id, amount }
    }
}

/// Shared, stock-aware shopping cart.
pub struct CartStore {
    catalog: Arc<dyn CatalogApi>,
    storage: Arc<dyn KeyValueStorage>,
    notifier: Arc<dyn Notifier>,
    config: CartConfig,
    /// Committed cart; the lock is held for a whole mutation.
    cart: Mutex<Arc<Cart>>,
    published: watch::Sender<Arc<Cart>>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("storage", &self.storage)
            .field("notifier", &self.notifier)
            .field("config", &self.config)
            .field("cart", &*self.published.borrow())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create a store, restoring the cart from durable storage.
    ///
    /// A missing value starts an empty cart. Unreadable or corrupt values
    /// also start an empty cart and are logged; they are overwritten by the
    /// next successful mutation.
    #[must_use]
    pub fn load(
        catalog: Arc<dyn CatalogApi>,
        storage: Arc<dyn KeyValueStorage>,
        notifier: Arc<dyn Notifier>,
        config: CartConfig,
    ) -> Self {
        let cart = Arc::new(restore_cart(storage.as_ref()));
        let (published, _) = watch::channel(Arc::clone(&cart));

        Self {
            catalog,
            storage,
            notifier,
            config,
            cart: Mutex::new(cart),
            published,
        }
    }

    /// Snapshot of the last committed cart.
    #[must_use]
    pub fn cart(&self) -> Arc<Cart> {
        Arc::clone(&self.published.borrow())
    }

    /// Receive the cart every time it changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Cart>> {
        self.published.subscribe()
    }

    #[must_use]
    pub const fn config(&self) -> &CartConfig {
        &self.config
    }

    /// Add one unit of a product.
    ///
    /// Increments the entry if the product is already in the cart and stock
    /// allows one more; otherwise fetches the product from the catalog and
    /// appends it with amount 1.
    ///
    /// # Errors
    ///
    /// - `OutOfStock` if stock does not cover the new amount
    /// - `Api` if the stock or catalog lookup fails
    /// - `Storage`/`Serialize` if the cart cannot be persisted
    ///
    /// Failures are also reported through the notifier. The cart is
    /// unchanged on every error path.
    #[instrument(skip_all, fields(product_id = %product_id))]
    pub async fn add_product(&self, product_id: ProductId) -> Result<()> {
        let result = self.try_add_product(product_id).await;
        self.report(CartOperation::Add, result)
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the product is not in the cart
    /// - `Storage`/`Serialize` if the cart cannot be persisted
    #[instrument(skip_all, fields(product_id = %product_id))]
    pub async fn remove_product(&self, product_id: ProductId) -> Result<()> {
        let result = self.try_remove_product(product_id).await;
        self.report(CartOperation::Remove, result)
    }

    /// Set the amount of a product already in the cart.
    ///
    /// An amount of zero or less is ignored: the cart is left as is and no
    /// notification is shown.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the product is not in the cart
    /// - `OutOfStock` if stock does not cover the requested amount
    /// - `Api` if the stock lookup fails
    /// - `Storage`/`Serialize` if the cart cannot be persisted
    #[instrument(skip_all, fields(product_id = %update.product_id, amount = update.amount))]
    pub async fn update_product_amount(&self, update: UpdateProductAmount) -> Result<()> {
        let result = self.try_update_product_amount(update).await;
        self.report(CartOperation::UpdateAmount, result)
    }

    async fn try_add_product(&self, product_id: ProductId) -> Result<()> {
        let mut current = self.cart.lock().await;
        let mut next = Cart::clone(&current);

        if let Some(existing) = current.get(product_id) {
            self.ensure_stock(product_id, i64::from(existing.amount) + 1)
                .await?;
            next.increment(product_id)?;
        } else {
            if self.config.check_stock_on_first_add {
                self.ensure_stock(product_id, 1).await?;
            }

            let mut product = self.catalog.product(product_id).await?;
            if product.id != product_id {
                tracing::warn!(
                    returned_id = %product.id,
                    "Catalog returned a different product ID, keeping the requested one"
                );
                product.id = product_id;
            }
            next.push(product)?;
        }

        let amount = next.get(product_id).map(|item| item.amount);
        self.commit(&mut current, next)?;
        add_breadcrumb(CartOperation::Add, product_id, amount);
        Ok(())
    }

    async fn try_remove_product(&self, product_id: ProductId) -> Result<()> {
        let mut current = self.cart.lock().await;
        let mut next = Cart::clone(&current);

        next.remove(product_id)?;

        self.commit(&mut current, next)?;
        add_breadcrumb(CartOperation::Remove, product_id, None);
        Ok(())
    }

    async fn try_update_product_amount(&self, update: UpdateProductAmount) -> Result<()> {
        let UpdateProductAmount { product_id, amount } = update;
        let mut current = self.cart.lock().await;

        if !current.contains(product_id) {
            return Err(CartError::NotFound(product_id));
        }

        if amount <= 0 {
            tracing::debug!("Ignoring non-positive amount");
            return Ok(());
        }

        let stock = self.ensure_stock(product_id, amount).await?;
        let amount = u32::try_from(amount).map_err(|_| CartError::OutOfStock {
            product_id,
            requested: amount,
            available: stock.amount,
        })?;

        let mut next = Cart::clone(&current);
        next.set_amount(product_id, amount)?;

        self.commit(&mut current, next)?;
        add_breadcrumb(CartOperation::UpdateAmount, product_id, Some(amount));
        Ok(())
    }

    /// Fetch stock and fail with `OutOfStock` unless it covers `requested`.
    async fn ensure_stock(&self, product_id: ProductId, requested: i64) -> Result<Stock> {
        let stock = self.catalog.stock(product_id).await?;
        if stock.covers(requested) {
            Ok(stock)
        } else {
            Err(CartError::OutOfStock {
                product_id,
                requested,
                available: stock.amount,
            })
        }
    }

    /// Persist `next`, then make it the committed cart.
    fn commit(&self, current: &mut Arc<Cart>, next: Cart) -> Result<()> {
        let json = serde_json::to_string(&next)?;
        self.storage.set_item(keys::CART, &json)?;

        let next = Arc::new(next);
        *current = Arc::clone(&next);
        self.published.send_replace(next);
        Ok(())
    }

    /// Show the user-facing message for a failed operation.
    fn report(&self, operation: CartOperation, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            // The notifier is the user-facing report; this only keeps the detail
            tracing::debug!(operation = operation.as_str(), error = %err, "Cart operation failed");
            self.notifier.error(err.user_message(operation));
        }
        result
    }
}

/// Read the stored cart, falling back to an empty one.
fn restore_cart(storage: &dyn KeyValueStorage) -> Cart {
    let raw = match storage.get_item(keys::CART) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Cart::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read stored cart, starting empty");
            return Cart::new();
        }
    };

    match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
        Ok(values) => {
            let (cart, dropped) = Cart::from_values(values);
            if dropped > 0 {
                tracing::warn!(dropped, kept = cart.len(), "Discarded invalid entries from stored cart");
            }
            cart
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stored cart is not a JSON array, starting empty");
            Cart::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use rocketshoes_core::{CartItem, Price, Product};

    use super::*;
    use crate::api::ApiError;
    use crate::notify::MemoryNotifier;
    use crate::storage::MemoryStorage;

    #[derive(Default)]
    struct FakeCatalog {
        stock: SyncMutex<HashMap<ProductId, i64>>,
        products: HashMap<ProductId, Product>,
        product_calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn with_product(mut self, id: i32, title: &str, cents: i64, stock: i64) -> Self {
            let id = ProductId::new(id);
            self.products
                .insert(id, Product::new(id, title, Price::from_cents(cents)));
            self.stock.lock().insert(id, stock);
            self
        }
    }

    #[async_trait]
    impl CatalogApi for FakeCatalog {
        async fn stock(&self, id: ProductId) -> std::result::Result<Stock, ApiError> {
            tokio::task::yield_now().await;
            let amount = self
                .stock
                .lock()
                .get(&id)
                .copied()
                .ok_or_else(|| ApiError::NotFound(format!("stock/{id}")))?;
            Ok(Stock { id, amount })
        }

        async fn product(&self, id: ProductId) -> std::result::Result<Product, ApiError> {
            tokio::task::yield_now().await;
            self.product_calls.fetch_add(1, Ordering::SeqCst);
            self.products
                .get(&id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("products/{id}")))
        }
    }

    struct Harness {
        store: CartStore,
        storage: Arc<MemoryStorage>,
        notifier: Arc<MemoryNotifier>,
    }

    fn harness(catalog: FakeCatalog, storage: MemoryStorage, config: CartConfig) -> Harness {
        let storage = Arc::new(storage);
        let notifier = Arc::new(MemoryNotifier::new());
        let store = CartStore::load(
            Arc::new(catalog),
            Arc::clone(&storage) as Arc<dyn KeyValueStorage>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            config,
        );
        Harness {
            store,
            storage,
            notifier,
        }
    }

    fn stored_cart(items: &[(i32, u32)]) -> MemoryStorage {
        let items: Vec<CartItem> = items
            .iter()
            .map(|&(id, amount)| {
                let product =
                    Product::new(ProductId::new(id), format!("Shoe {id}"), Price::from_cents(1000));
                CartItem::from_product(product, amount)
            })
            .collect();
        MemoryStorage::with_item(keys::CART, serde_json::to_string(&items).unwrap())
    }

    fn amount_of(store: &CartStore, id: i32) -> Option<u32> {
        store.cart().get(ProductId::new(id)).map(|item| item.amount)
    }

    #[tokio::test]
    async fn test_add_new_product_appends_amount_one() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 5),
            MemoryStorage::new(),
            CartConfig::default(),
        );

        h.store.add_product(ProductId::new(1)).await.unwrap();

        let cart = h.store.cart();
        assert_eq!(cart.len(), 1);
        assert_eq!(amount_of(&h.store, 1), Some(1));
        assert!(h.notifier.errors().is_empty());
    }

    #[tokio::test]
    async fn test_add_existing_product_increments() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 3),
            stored_cart(&[(1, 2)]),
            CartConfig::default(),
        );

        h.store.add_product(ProductId::new(1)).await.unwrap();
        assert_eq!(amount_of(&h.store, 1), Some(3));
    }

    #[tokio::test]
    async fn test_add_beyond_stock_is_rejected() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 2),
            stored_cart(&[(1, 2)]),
            CartConfig::default(),
        );
        let before = h.storage.get_item(keys::CART).unwrap();

        let err = h.store.add_product(ProductId::new(1)).await.unwrap_err();

        assert!(err.is_out_of_stock());
        assert_eq!(amount_of(&h.store, 1), Some(2));
        assert_eq!(h.storage.get_item(keys::CART).unwrap(), before);
        assert_eq!(h.notifier.errors(), vec![crate::error::OUT_OF_STOCK_MESSAGE]);
    }

    #[tokio::test]
    async fn test_first_add_checks_stock_by_default() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 0),
            MemoryStorage::new(),
            CartConfig::default(),
        );

        let err = h.store.add_product(ProductId::new(1)).await.unwrap_err();
        assert!(err.is_out_of_stock());
        assert!(h.store.cart().is_empty());
    }

    #[tokio::test]
    async fn test_first_add_without_stock_check() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 0),
            MemoryStorage::new(),
            CartConfig {
                check_stock_on_first_add: false,
            },
        );

        h.store.add_product(ProductId::new(1)).await.unwrap();
        assert_eq!(amount_of(&h.store, 1), Some(1));
    }

    #[tokio::test]
    async fn test_add_unknown_product_reports_generic_failure() {
        let h = harness(
            FakeCatalog::default(),
            MemoryStorage::new(),
            CartConfig {
                check_stock_on_first_add: false,
            },
        );

        let err = h.store.add_product(ProductId::new(9)).await.unwrap_err();

        assert!(matches!(err, CartError::Api(ApiError::NotFound(_))));
        assert!(h.store.cart().is_empty());
        assert_eq!(h.storage.get_item(keys::CART).unwrap(), None);
        assert_eq!(h.notifier.errors(), vec!["Failed to add product"]);
    }

    #[tokio::test]
    async fn test_remove_present_product() {
        let h = harness(
            FakeCatalog::default(),
            stored_cart(&[(1, 1), (2, 4), (3, 1)]),
            CartConfig::default(),
        );

        h.store.remove_product(ProductId::new(2)).await.unwrap();

        let ids: Vec<i32> = h.store.cart().iter().map(|item| item.id.as_i32()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_remove_absent_product() {
        let h = harness(
            FakeCatalog::default(),
            stored_cart(&[(1, 1)]),
            CartConfig::default(),
        );

        let err = h.store.remove_product(ProductId::new(2)).await.unwrap_err();

        assert!(matches!(err, CartError::NotFound(_)));
        assert_eq!(h.store.cart().len(), 1);
        assert_eq!(h.notifier.errors(), vec!["Failed to remove product"]);
    }

    #[tokio::test]
    async fn test_update_non_positive_amount_is_silent_noop() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 5),
            stored_cart(&[(1, 1)]),
            CartConfig::default(),
        );

        for amount in [0, -3] {
            h.store
                .update_product_amount(UpdateProductAmount::new(ProductId::new(1), amount))
                .await
                .unwrap();
        }

        assert_eq!(amount_of(&h.store, 1), Some(1));
        assert!(h.notifier.errors().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_entry_fails_before_amount_check() {
        let h = harness(
            FakeCatalog::default(),
            MemoryStorage::new(),
            CartConfig::default(),
        );

        let err = h
            .store
            .update_product_amount(UpdateProductAmount::new(ProductId::new(1), 0))
            .await
            .unwrap_err();

        assert!(matches!(err, CartError::NotFound(_)));
        assert_eq!(h.notifier.errors(), vec!["Failed to update product quantity"]);
    }

    #[tokio::test]
    async fn test_update_within_and_beyond_stock() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 4),
            stored_cart(&[(1, 1)]),
            CartConfig::default(),
        );

        h.store
            .update_product_amount(UpdateProductAmount::new(ProductId::new(1), 4))
            .await
            .unwrap();
        assert_eq!(amount_of(&h.store, 1), Some(4));

        let err = h
            .store
            .update_product_amount(UpdateProductAmount::new(ProductId::new(1), 5))
            .await
            .unwrap_err();
        assert!(err.is_out_of_stock());
        assert_eq!(amount_of(&h.store, 1), Some(4));
    }

    #[tokio::test]
    async fn test_storage_matches_memory_after_mutation() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 5),
            MemoryStorage::new(),
            CartConfig::default(),
        );

        h.store.add_product(ProductId::new(1)).await.unwrap();
        h.store.add_product(ProductId::new(1)).await.unwrap();

        let stored = h.storage.get_item(keys::CART).unwrap().unwrap();
        assert_eq!(stored, serde_json::to_string(&*h.store.cart()).unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 10),
            stored_cart(&[(1, 1)]),
            CartConfig::default(),
        );
        let id = ProductId::new(1);

        let (a, b, c) = tokio::join!(
            h.store.add_product(id),
            h.store.add_product(id),
            h.store.add_product(id)
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        assert_eq!(amount_of(&h.store, 1), Some(4));
    }

    #[tokio::test]
    async fn test_concurrent_first_adds_fetch_product_once() {
        let catalog = Arc::new(FakeCatalog::default().with_product(1, "Shoe", 1000, 10));
        let store = CartStore::load(
            Arc::clone(&catalog) as Arc<dyn CatalogApi>,
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryNotifier::new()),
            CartConfig::default(),
        );
        let id = ProductId::new(1);

        let (a, b) = tokio::join!(store.add_product(id), store.add_product(id));
        a.unwrap();
        b.unwrap();

        assert_eq!(store.cart().len(), 1);
        assert_eq!(store.cart().get(id).unwrap().amount, 2);
        assert_eq!(catalog.product_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_commits() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 5),
            MemoryStorage::new(),
            CartConfig::default(),
        );
        let mut rx = h.store.subscribe();

        h.store.add_product(ProductId::new(1)).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        // Rejected changes publish nothing
        h.store.remove_product(ProductId::new(7)).await.unwrap_err();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_corrupt_storage_loads_empty() {
        let storage = MemoryStorage::with_item(keys::CART, "{not json");
        assert!(restore_cart(&storage).is_empty());
    }

    #[test]
    fn test_restore_drops_invalid_entries() {
        let storage = MemoryStorage::with_item(
            keys::CART,
            r#"[{"id":1,"title":"A","price":10,"image":"","amount":0},
                {"id":2,"title":"B","price":10,"image":"","amount":1}]"#,
        );
        let cart = restore_cart(&storage);
        assert_eq!(cart.len(), 1);
        assert!(cart.contains(ProductId::new(2)));
    }

    #[test]
    fn test_restore_keeps_valid_entries_beside_malformed_ones() {
        let storage = MemoryStorage::with_item(
            keys::CART,
            r#"[{"id":1,"title":"A","price":10,"amount":3},{"id":2,"price":5,"amount":"x"}]"#,
        );
        let cart = restore_cart(&storage);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().amount, 3);
    }

    #[tokio::test]
    async fn test_add_counts_entry_stored_without_display_fields() {
        let h = harness(
            FakeCatalog::default().with_product(1, "Shoe", 1000, 2),
            MemoryStorage::with_item(keys::CART, r#"[{"id":1,"amount":2}]"#),
            CartConfig::default(),
        );
        assert_eq!(amount_of(&h.store, 1), Some(2));

        let err = h.store.add_product(ProductId::new(1)).await.unwrap_err();

        assert!(matches!(err, CartError::OutOfStock { requested: 3, available: 2, .. }));
        assert_eq!(
            h.storage.get_item(keys::CART).unwrap().as_deref(),
            Some(r#"[{"id":1,"amount":2}]"#)
        );
        assert_eq!(h.notifier.errors(), vec![crate::error::OUT_OF_STOCK_MESSAGE]);
    }

    #[tokio::test]
    async fn test_failure_is_warned_once() {
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::Layer;

        struct WarnCounter(Arc<AtomicUsize>);

        impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                if matches!(*event.metadata().level(), tracing::Level::WARN | tracing::Level::ERROR) {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = CartStore::load(
            Arc::new(FakeCatalog::default()),
            Arc::new(MemoryStorage::new()),
            Arc::new(crate::notify::TracingNotifier),
            CartConfig::default(),
        );
        store.remove_product(ProductId::new(1)).await.unwrap_err();

        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }
}
