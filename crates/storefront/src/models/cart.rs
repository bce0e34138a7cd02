//! Cart domain types.

use serde::{Deserialize, Serialize};

use bramble_core::CartItemId;

use super::product::ProductSnapshot;

/// One row of a shopper's cart.
///
/// Rows are unique per (shopper, product); adding a product that is
/// already in the cart increments the quantity of the existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Unique cart row ID.
    pub id: CartItemId,
    /// Number of units of the product.
    pub quantity: i32,
    /// Product data joined onto the row, including the snapshot price.
    pub product: ProductSnapshot,
}
