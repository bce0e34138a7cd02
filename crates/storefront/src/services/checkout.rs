//! Checkout: turn a shopper's cart into a persisted order.
//!
//! There is no multi-table transaction available at this seam, so the
//! pipeline runs as a saga with an explicit compensation step:
//!
//! 1. insert the order header (carrying the checkout token),
//! 2. insert all order lines as one batch,
//! 3. only then delete the cart rows.
//!
//! A line-insert failure deletes the header again and leaves the cart
//! untouched, so the shopper can retry; a failure before the header exists
//! writes nothing. The caller only ever observes a placed order or an
//! error, never a half-written state.
//!
//! Retries are de-duplicated by the [`CheckoutToken`]: the header insert
//! conflicts if a previous attempt already placed the order, in which case
//! the existing order is returned and the cart clear is finished.

use thiserror::Error;

use bramble_core::{CheckoutToken, OrderId, OrderStatus, Price, UserId};

use crate::db::RepositoryError;
use crate::models::{CartItem, NewOrder, Order, OrderItem};

/// Persistence operations checkout needs.
///
/// Implemented by `db::orders::OrderRepository`; tests substitute an
/// in-memory store that records every call.
#[allow(async_fn_in_trait)]
pub trait CheckoutStore {
    /// Insert an order header; a checkout-token conflict means a previous
    /// attempt already placed this order.
    async fn create_order(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Find the order placed under this token, if any.
    async fn find_by_checkout_token(
        &self,
        token: CheckoutToken,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Insert all order lines as a single batch.
    async fn insert_order_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError>;

    /// Compensation: remove a header whose lines could not be written.
    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError>;

    /// Blanket-delete the shopper's cart rows.
    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError>;
}

impl<S: CheckoutStore + Sync> CheckoutStore for &S {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        (**self).create_order(order).await
    }

    async fn find_by_checkout_token(
        &self,
        token: CheckoutToken,
    ) -> Result<Option<Order>, RepositoryError> {
        (**self).find_by_checkout_token(token).await
    }

    async fn insert_order_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError> {
        (**self).insert_order_items(items).await
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError> {
        (**self).delete_order(id).await
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        (**self).clear_cart(user_id).await
    }
}

/// Errors surfaced by [`CheckoutService::place_order`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart was empty; nothing was written.
    #[error("cart is empty")]
    EmptyCart,

    /// The order header could not be created; nothing was written.
    #[error("failed to create order: {0}")]
    OrderCreate(#[source] RepositoryError),

    /// The order lines could not be written; the header was removed again
    /// and the cart is untouched.
    #[error("failed to record order lines: {0}")]
    OrderItems(#[source] RepositoryError),

    /// The order is placed but the cart rows could not be deleted; a retry
    /// with the same token returns the order and re-attempts the clear.
    #[error("order placed but cart not cleared: {0}")]
    CartClear(#[source] RepositoryError),
}

/// Sum of `snapshot price x quantity` over the cart rows.
///
/// Uses the prices already loaded with the rows; no product is re-read, so
/// a concurrent catalog price change cannot move the total.
#[must_use]
pub fn cart_total(items: &[CartItem]) -> Price {
    items
        .iter()
        .map(|item| item.product.price.times(item.quantity))
        .sum()
}

/// Orchestrates the checkout saga over a [`CheckoutStore`].
pub struct CheckoutService<S> {
    store: S,
}

impl<S: CheckoutStore> CheckoutService<S> {
    /// Create a new checkout service.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Place an order for the given cart rows.
    ///
    /// The caller must already be authenticated; `items` is the full set of
    /// the shopper's currently fetched cart rows, and `token` identifies
    /// this checkout attempt across retries.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] without touching the store, or
    /// one of the write errors described on [`CheckoutError`].
    pub async fn place_order(
        &self,
        user_id: UserId,
        items: &[CartItem],
        token: CheckoutToken,
    ) -> Result<Order, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let total = cart_total(items);
        let new_order = NewOrder {
            user_id,
            total_price: total,
            status: OrderStatus::Pending,
            checkout_token: token,
        };

        let order = match self.store.create_order(&new_order).await {
            Ok(order) => order,
            Err(RepositoryError::Conflict(_)) => {
                return self.resume_placed_order(user_id, token).await;
            }
            Err(e) => return Err(CheckoutError::OrderCreate(e)),
        };

        let lines: Vec<OrderItem> = items
            .iter()
            .map(|item| OrderItem {
                order_id: order.id,
                product_id: item.product.id,
                quantity: item.quantity,
                price: item.product.price,
            })
            .collect();

        if let Err(e) = self.store.insert_order_items(&lines).await {
            // The header must not survive without its lines. The cart stays
            // as it was so the shopper can retry.
            if let Err(cleanup) = self.store.delete_order(order.id).await {
                tracing::error!(
                    order_id = %order.id,
                    error = %cleanup,
                    "could not remove order header after line insert failure; \
                     the token keeps retries from duplicating it"
                );
            }
            return Err(CheckoutError::OrderItems(e));
        }

        // Lines are confirmed; only now does the cart go away.
        self.store
            .clear_cart(user_id)
            .await
            .map_err(CheckoutError::CartClear)?;

        tracing::info!(order_id = %order.id, total = %order.total_price, "order placed");
        Ok(order)
    }

    /// A token conflict means an earlier attempt already placed this order
    /// and the response was lost. Hand the existing order back and finish
    /// the cart clear that attempt may not have reached.
    async fn resume_placed_order(
        &self,
        user_id: UserId,
        token: CheckoutToken,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .store
            .find_by_checkout_token(token)
            .await
            .map_err(CheckoutError::OrderCreate)?
            .ok_or(CheckoutError::OrderCreate(RepositoryError::NotFound))?;

        tracing::info!(
            order_id = %order.id,
            "checkout retried with an already-used token; returning the existing order"
        );

        self.store
            .clear_cart(user_id)
            .await
            .map_err(CheckoutError::CartClear)?;

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use bramble_core::{CartItemId, ProductId};

    use super::*;
    use crate::models::ProductSnapshot;

    /// In-memory store recording every call, with injectable failures.
    #[derive(Default)]
    struct RecordingStore {
        orders: Mutex<Vec<Order>>,
        lines: Mutex<Vec<OrderItem>>,
        cart_cleared: Mutex<bool>,
        calls: Mutex<Vec<&'static str>>,
        fail_create: bool,
        fail_lines: bool,
        fail_clear: bool,
    }

    impl RecordingStore {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("lock").clone()
        }

        fn orders(&self) -> Vec<Order> {
            self.orders.lock().expect("lock").clone()
        }

        fn lines(&self) -> Vec<OrderItem> {
            self.lines.lock().expect("lock").clone()
        }

        fn cart_cleared(&self) -> bool {
            *self.cart_cleared.lock().expect("lock")
        }

        fn injected() -> RepositoryError {
            RepositoryError::DataCorruption("injected failure".to_owned())
        }
    }

    impl CheckoutStore for RecordingStore {
        async fn create_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
            self.calls.lock().expect("lock").push("create_order");
            if self.fail_create {
                return Err(Self::injected());
            }
            let mut orders = self.orders.lock().expect("lock");
            if orders
                .iter()
                .any(|o| o.checkout_token == order.checkout_token)
            {
                return Err(RepositoryError::Conflict(
                    "checkout token already used".to_owned(),
                ));
            }
            let id = i32::try_from(orders.len()).expect("small test id") + 1;
            let stored = Order {
                id: OrderId::new(id),
                user_id: order.user_id,
                total_price: order.total_price,
                status: order.status,
                checkout_token: order.checkout_token,
                created_at: Utc::now(),
            };
            orders.push(stored.clone());
            Ok(stored)
        }

        async fn find_by_checkout_token(
            &self,
            token: CheckoutToken,
        ) -> Result<Option<Order>, RepositoryError> {
            self.calls.lock().expect("lock").push("find_by_checkout_token");
            Ok(self
                .orders
                .lock()
                .expect("lock")
                .iter()
                .find(|o| o.checkout_token == token)
                .cloned())
        }

        async fn insert_order_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError> {
            self.calls.lock().expect("lock").push("insert_order_items");
            if self.fail_lines {
                return Err(Self::injected());
            }
            self.lines.lock().expect("lock").extend_from_slice(items);
            Ok(())
        }

        async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError> {
            self.calls.lock().expect("lock").push("delete_order");
            self.orders.lock().expect("lock").retain(|o| o.id != id);
            Ok(())
        }

        async fn clear_cart(&self, _user_id: UserId) -> Result<(), RepositoryError> {
            self.calls.lock().expect("lock").push("clear_cart");
            if self.fail_clear {
                return Err(Self::injected());
            }
            *self.cart_cleared.lock().expect("lock") = true;
            Ok(())
        }
    }

    fn item(id: i32, product_id: i32, quantity: i32, price_cents: i64) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            quantity,
            product: ProductSnapshot {
                id: ProductId::new(product_id),
                name: format!("product-{product_id}"),
                price: Price::new(Decimal::new(price_cents, 2)),
                image_url: String::new(),
            },
        }
    }

    fn two_row_cart() -> Vec<CartItem> {
        // 2 x 10.00 + 1 x 5.00 = 25.00
        vec![item(1, 101, 2, 1000), item(2, 102, 1, 500)]
    }

    #[tokio::test]
    async fn empty_cart_fails_without_any_store_call() {
        let store = RecordingStore::default();
        let service = CheckoutService::new(&store);

        let result = service
            .place_order(UserId::new(1), &[], CheckoutToken::generate())
            .await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn successful_checkout_writes_header_lines_and_clears_cart() {
        let store = RecordingStore::default();
        let service = CheckoutService::new(&store);
        let items = two_row_cart();

        let order = service
            .place_order(UserId::new(1), &items, CheckoutToken::generate())
            .await
            .expect("order placed");

        assert_eq!(order.total_price, Price::new(Decimal::new(2500, 2)));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(store.orders().len(), 1);
        assert!(store.cart_cleared());

        let lines = store.lines();
        assert_eq!(lines.len(), items.len());
        assert_eq!(lines[0].product_id, ProductId::new(101));
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[0].price, Price::new(Decimal::new(1000, 2)));
        assert_eq!(lines[1].product_id, ProductId::new(102));
        assert_eq!(lines[1].quantity, 1);
        assert_eq!(lines[1].price, Price::new(Decimal::new(500, 2)));

        // The cart is only cleared after the lines are confirmed.
        assert_eq!(
            store.calls(),
            vec!["create_order", "insert_order_items", "clear_cart"]
        );
    }

    #[tokio::test]
    async fn lines_carry_the_snapshot_price_at_call_time() {
        let store = RecordingStore::default();
        let service = CheckoutService::new(&store);

        // The store is never asked for a product price; the total and the
        // lines can only come from the snapshots passed in.
        let items = vec![item(1, 101, 3, 799)];
        let order = service
            .place_order(UserId::new(1), &items, CheckoutToken::generate())
            .await
            .expect("order placed");

        assert_eq!(order.total_price, Price::new(Decimal::new(2397, 2)));
        assert_eq!(store.lines()[0].price, Price::new(Decimal::new(799, 2)));
    }

    #[tokio::test]
    async fn header_failure_writes_nothing_else() {
        let store = RecordingStore {
            fail_create: true,
            ..RecordingStore::default()
        };
        let service = CheckoutService::new(&store);

        let result = service
            .place_order(UserId::new(1), &two_row_cart(), CheckoutToken::generate())
            .await;

        assert!(matches!(result, Err(CheckoutError::OrderCreate(_))));
        assert!(store.lines().is_empty());
        assert!(!store.cart_cleared());
        assert_eq!(store.calls(), vec!["create_order"]);
    }

    #[tokio::test]
    async fn line_failure_compensates_header_and_keeps_cart() {
        let store = RecordingStore {
            fail_lines: true,
            ..RecordingStore::default()
        };
        let service = CheckoutService::new(&store);

        let result = service
            .place_order(UserId::new(1), &two_row_cart(), CheckoutToken::generate())
            .await;

        assert!(matches!(result, Err(CheckoutError::OrderItems(_))));
        // The header was removed again and the cart was never touched.
        assert!(store.orders().is_empty());
        assert!(!store.cart_cleared());
        assert_eq!(
            store.calls(),
            vec!["create_order", "insert_order_items", "delete_order"]
        );
    }

    #[tokio::test]
    async fn retry_with_same_token_returns_existing_order() {
        let store = RecordingStore::default();
        let service = CheckoutService::new(&store);
        let items = two_row_cart();
        let token = CheckoutToken::generate();

        let first = service
            .place_order(UserId::new(1), &items, token)
            .await
            .expect("first attempt");
        let second = service
            .place_order(UserId::new(1), &items, token)
            .await
            .expect("retry");

        assert_eq!(first.id, second.id);
        assert_eq!(store.orders().len(), 1);
        assert_eq!(store.lines().len(), items.len());
    }

    #[tokio::test]
    async fn clear_failure_surfaces_and_retry_converges() {
        let store = RecordingStore {
            fail_clear: true,
            ..RecordingStore::default()
        };
        let service = CheckoutService::new(&store);
        let items = two_row_cart();
        let token = CheckoutToken::generate();

        let result = service.place_order(UserId::new(1), &items, token).await;
        assert!(matches!(result, Err(CheckoutError::CartClear(_))));
        // The order itself is durably placed.
        assert_eq!(store.orders().len(), 1);

        // Same token once the backend recovers: the existing order comes
        // back and the cart clear completes.
        let recovered = RecordingStore {
            orders: Mutex::new(store.orders()),
            lines: Mutex::new(store.lines()),
            ..RecordingStore::default()
        };
        let service = CheckoutService::new(&recovered);
        let order = service
            .place_order(UserId::new(1), &items, token)
            .await
            .expect("retry converges");

        assert_eq!(recovered.orders().len(), 1);
        assert_eq!(order.checkout_token, token);
        assert!(recovered.cart_cleared());
    }

    #[test]
    fn cart_total_sums_snapshot_prices() {
        assert_eq!(
            cart_total(&two_row_cart()),
            Price::new(Decimal::new(2500, 2))
        );
        assert_eq!(cart_total(&[]), Price::ZERO);
    }
}
