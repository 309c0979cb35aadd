//! Catalog and stock REST API.
//!
//! # Architecture
//!
//! - [`CatalogApi`] is the seam the cart store talks to, so tests can swap in
//!   an in-memory catalog
//! - [`ApiClient`] is the `reqwest` implementation
//! - Product definitions are cached via `moka`; stock is always fetched live,
//!   since a stale stock level would defeat the cart's quantity checks
//!
//! # Endpoints
//!
//! - `GET /stock/{id}` returns `{ "id": 1, "amount": 3 }`
//! - `GET /products/{id}` returns `{ "id": 1, "title": "...", "price": 179.9, "image": "..." }`

mod client;

pub use client::ApiClient;

use async_trait::async_trait;
use rocketshoes_core::{Product, ProductId, Stock};
use thiserror::Error;

/// Errors that can occur when talking to the catalog API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Read access to the product catalog and stock levels.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Current stock for a product.
    async fn stock(&self, id: ProductId) -> Result<Stock, ApiError>;

    /// Catalog definition of a product.
    async fn product(&self, id: ProductId) -> Result<Product, ApiError>;
}
