//! Product catalog domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bramble_core::{Price, ProductId};

/// A catalog product.
#[derive(Debug, Clone)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Optional long-form description.
    pub description: Option<String>,
    /// Current list price.
    pub price: Price,
    /// Image URL for listings and the cart.
    pub image_url: String,
    /// When the product was added to the catalog.
    pub created_at: DateTime<Utc>,
}

/// The slice of product data carried on a cart row.
///
/// The price here is the snapshot the checkout total and the order lines
/// are computed from; a later catalog price change does not reach rows
/// that already hold a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Product ID the cart row points at.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price at the time the cart row was loaded.
    pub price: Price,
    /// Image URL.
    pub image_url: String,
}
