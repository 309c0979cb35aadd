//! Remote stock levels.

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// Available quantity for a product (`GET /stock/{id}`).
///
/// Read-only and never owned by the cart. The amount is signed because the
/// inventory service may report oversold products below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: ProductId,
    pub amount: i64,
}

impl Stock {
    /// Whether `requested` units can be taken from this stock.
    #[must_use]
    pub const fn covers(&self, requested: i64) -> bool {
        self.amount >= requested
    }
}
