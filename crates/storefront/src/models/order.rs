//! Order domain types.

use chrono::{DateTime, Utc};

use bramble_core::{CheckoutToken, OrderId, OrderStatus, Price, ProductId, UserId};

/// A placed order header.
#[derive(Debug, Clone)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Shopper the order belongs to.
    pub user_id: UserId,
    /// Total computed from the cart's snapshot prices at checkout time.
    pub total_price: Price,
    /// Lifecycle status; checkout writes `pending`.
    pub status: OrderStatus,
    /// Idempotency token of the checkout attempt that placed this order.
    pub checkout_token: CheckoutToken,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

/// An order header about to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_price: Price,
    pub status: OrderStatus,
    pub checkout_token: CheckoutToken,
}

/// One order line.
///
/// `price` is the snapshot carried over from the cart row, never a live
/// product read; historical orders keep their value when catalog prices
/// change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: Price,
}

/// An order line joined with its product name, for display.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i32,
    pub price: Price,
}

impl OrderLine {
    /// Quantity times the snapshot unit price.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}
