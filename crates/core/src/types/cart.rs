//! The shopping cart and its line items.
//!
//! A [`Cart`] is an ordered list of [`CartItem`]s, unique by product ID, where
//! every item has a positive amount. The mutation methods keep those two
//! invariants; deciding whether stock allows a mutation is the caller's job.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Price, Product, ProductId};

/// Errors from applying a mutation to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CartMutationError {
    /// No entry with this product ID.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),

    /// An entry with this product ID already exists.
    #[error("product {0} is already in the cart")]
    AlreadyInCart(ProductId),

    /// Amounts must be positive; removal goes through `Cart::remove`.
    #[error("amount for product {0} must be positive")]
    ZeroAmount(ProductId),
}

/// Keys a [`CartItem`] types itself; they never appear in `extra`.
const TYPED_KEYS: [&str; 5] = ["id", "title", "price", "image", "amount"];

/// A catalog product with the quantity held in the cart.
///
/// Serialized flat, as `{id, title, price, image, amount, ...}`. Only `id`
/// and `amount` are required; everything else passes through as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub amount: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CartItem {
    /// Build a cart entry from a catalog product.
    ///
    /// Catalog fields that collide with the entry's own keys (such as an
    /// `amount` in the catalog response) are dropped; the entry's values win.
    #[must_use]
    pub fn from_product(product: Product, amount: u32) -> Self {
        let mut extra = product.extra;
        for key in TYPED_KEYS {
            extra.remove(key);
        }

        Self {
            id: product.id,
            title: product.title,
            price: product.price,
            image: product.image,
            amount,
            extra,
        }
    }

    /// Title for display, empty when the catalog sent none.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    /// Unit price, zero when the catalog sent none.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.price.unwrap_or(Price::ZERO)
    }

    /// Price of this line (`price × amount`).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price().times(self.amount)
    }
}

/// Ordered cart contents.
///
/// Deserializing is lenient: entries that do not parse, have a zero amount
/// or repeat an earlier ID are dropped one by one, see [`Cart::from_values`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<Value>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from stored items, restoring the invariants.
    ///
    /// Items with a zero amount are dropped, and for duplicate IDs only the
    /// first occurrence is kept. Returns the cart and the number of items
    /// discarded.
    #[must_use]
    pub fn from_items(items: Vec<CartItem>) -> (Self, usize) {
        let total = items.len();
        let mut cart = Self::new();
        for item in items {
            if item.amount > 0 && !cart.contains(item.id) {
                cart.items.push(item);
            }
        }
        let dropped = total - cart.items.len();
        (cart, dropped)
    }

    /// Build a cart from stored JSON entries, restoring the invariants.
    ///
    /// Each entry is decoded on its own, so one malformed entry does not cost
    /// the others. Returns the cart and the number of entries discarded,
    /// whether malformed or rejected by [`Cart::from_items`].
    #[must_use]
    pub fn from_values(values: Vec<Value>) -> (Self, usize) {
        let total = values.len();
        let items: Vec<CartItem> = values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        let malformed = total - items.len();

        let (cart, rejected) = Self::from_items(items);
        (cart, malformed + rejected)
    }

    /// Items in display order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Iterate over items in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, CartItem> {
        self.items.iter()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an entry by product ID.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    /// Total number of units across all entries.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.amount)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Append a product with amount 1.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInCart` if an entry with the same ID exists.
    pub fn push(&mut self, product: Product) -> Result<(), CartMutationError> {
        if self.contains(product.id) {
            return Err(CartMutationError::AlreadyInCart(product.id));
        }
        self.items.push(CartItem::from_product(product, 1));
        Ok(())
    }

    /// Increase an entry's amount by one and return the new amount.
    ///
    /// # Errors
    ///
    /// Returns `NotInCart` if there is no entry with this ID.
    pub fn increment(&mut self, id: ProductId) -> Result<u32, CartMutationError> {
        let item = self.get_mut(id)?;
        item.amount = item.amount.saturating_add(1);
        Ok(item.amount)
    }

    /// Set an entry's amount.
    ///
    /// # Errors
    ///
    /// Returns `NotInCart` if there is no entry with this ID, or `ZeroAmount`
    /// if `amount` is zero.
    pub fn set_amount(&mut self, id: ProductId, amount: u32) -> Result<(), CartMutationError> {
        let item = self.get_mut(id)?;
        if amount == 0 {
            return Err(CartMutationError::ZeroAmount(id));
        }
        item.amount = amount;
        Ok(())
    }

    /// Remove an entry, keeping the order of the others.
    ///
    /// # Errors
    ///
    /// Returns `NotInCart` if there is no entry with this ID.
    pub fn remove(&mut self, id: ProductId) -> Result<CartItem, CartMutationError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(CartMutationError::NotInCart(id))?;
        Ok(self.items.remove(index))
    }

    fn get_mut(&mut self, id: ProductId) -> Result<&mut CartItem, CartMutationError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(CartMutationError::NotInCart(id))
    }
}

impl From<Vec<Value>> for Cart {
    fn from(values: Vec<Value>) -> Self {
        Self::from_values(values).0
    }
}

impl Serialize for Cart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartItem;
    type IntoIter = std::slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
