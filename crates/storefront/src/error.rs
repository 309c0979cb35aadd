//! Cart error types and their user-facing presentation.
//!
//! Every cart operation returns a typed [`CartError`]. The messages shown to
//! the user are a thin layer on top: out-of-stock gets its own message, every
//! other failure collapses to the operation's generic message.

use rocketshoes_core::{CartMutationError, ProductId};
use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Message shown when the requested quantity exceeds stock.
pub const OUT_OF_STOCK_MESSAGE: &str = "Requested quantity is out of stock";

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Stock does not cover the requested amount.
    #[error("Out of stock: product {product_id} requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// The product is not in the cart.
    #[error("Product {0} is not in the cart")]
    NotFound(ProductId),

    /// Catalog or stock lookup failed.
    #[error("Catalog error: {0}")]
    Api(#[from] ApiError),

    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cart could not be encoded for storage.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Cart mutation violated an invariant.
    #[error(transparent)]
    Invalid(CartMutationError),
}

impl From<CartMutationError> for CartError {
    fn from(err: CartMutationError) -> Self {
        match err {
            CartMutationError::NotInCart(id) => Self::NotFound(id),
            other => Self::Invalid(other),
        }
    }
}

impl CartError {
    /// Whether the user can fix this by choosing a smaller quantity.
    #[must_use]
    pub const fn is_out_of_stock(&self) -> bool {
        matches!(self, Self::OutOfStock { .. })
    }

    /// Message to show the user for a failed `operation`.
    #[must_use]
    pub const fn user_message(&self, operation: CartOperation) -> &'static str {
        if self.is_out_of_stock() {
            OUT_OF_STOCK_MESSAGE
        } else {
            operation.failure_message()
        }
    }
}

/// The cart operations, for logging and message selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOperation {
    Add,
    Remove,
    UpdateAmount,
}

impl CartOperation {
    /// Generic failure message for this operation.
    #[must_use]
    pub const fn failure_message(self) -> &'static str {
        match self {
            Self::Add => "Failed to add product",
            Self::Remove => "Failed to remove product",
            Self::UpdateAmount => "Failed to update product quantity",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::UpdateAmount => "update_amount",
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// changes leading up to an error. A no-op when Sentry is not initialized.
pub fn add_breadcrumb(operation: CartOperation, product_id: ProductId, amount: Option<u32>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some("cart".to_string()),
        message: Some(format!("{} product {product_id}", operation.as_str())),
        level: sentry::Level::Info,
        ..Default::default()
    };

    breadcrumb
        .data
        .insert("product_id".to_string(), product_id.as_i32().into());
    if let Some(amount) = amount {
        breadcrumb.data.insert("amount".to_string(), amount.into());
    }

    sentry::add_breadcrumb(breadcrumb);
}
