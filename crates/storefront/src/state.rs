//! Application state owned by the application root.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError, CatalogApi};
use crate::cart::CartStore;
use crate::config::StorefrontConfig;
use crate::notify::{Notifier, TracingNotifier};
use crate::storage::{FileStorage, KeyValueStorage, StorageError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to build API client: {0}")]
    Api(#[from] ApiError),
    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
}

/// Application state shared across consumers.
///
/// This struct is cheaply cloneable via `Arc`. It is built once at start-up
/// and handed to every consumer of the cart.
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    config: StorefrontConfig,
    cart: CartStore,
}

impl AppState {
    /// Create the application state from configuration.
    ///
    /// Wires the HTTP catalog client, file-backed storage under
    /// `config.storage_dir`, and a tracing notifier into a [`CartStore`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the storage
    /// directory cannot be created.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let catalog: Arc<dyn CatalogApi> = Arc::new(ApiClient::new(&config.api)?);
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::open(&config.storage_dir)?);
        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);

        Ok(Self::with_parts(config, catalog, storage, notifier))
    }

    /// Create the application state from explicit collaborators.
    #[must_use]
    pub fn with_parts(
        config: StorefrontConfig,
        catalog: Arc<dyn CatalogApi>,
        storage: Arc<dyn KeyValueStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cart = CartStore::load(catalog, storage, notifier, config.cart);

        Self {
            inner: Arc::new(AppStateInner { config, cart }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }
}
