//! Catalog product definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Price, ProductId};

/// A product as returned by the catalog (`GET /products/{id}`).
///
/// Only `id` is required. The display fields are optional and are written
/// back only when present. Fields the cart does not interpret are kept in
/// `extra` and written back unchanged, so richer catalog responses survive a
/// round trip through durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Create a product with no image and no passthrough fields.
    #[must_use]
    pub fn new(id: ProductId, title: impl Into<String>, price: Price) -> Self {
        Self {
            id,
            title: Some(title.into()),
            price: Some(price),
            image: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}
