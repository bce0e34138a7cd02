//! Order repository.
//!
//! Implements the persistence side of checkout: header insert with the
//! idempotency token under a unique constraint, batched line insert, the
//! compensating header delete, and the per-shopper reads for the order
//! history pages. `order_items` rows ride on `ON DELETE CASCADE`, so they
//! can never outlive their order.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use bramble_core::{CheckoutToken, OrderId, OrderStatus, Price, ProductId, UserId};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderItem, OrderLine};
use crate::services::checkout::CheckoutStore;

use super::cart::CartRepository;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    total_price: Decimal,
    status: String,
    checkout_token: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_str(&row.status).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            total_price: Price::new(row.total_price),
            status,
            checkout_token: CheckoutToken::from(row.checkout_token),
            created_at: row.created_at,
        })
    }
}

/// Internal row type for order lines joined with product names.
#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    product_id: i32,
    name: String,
    quantity: i32,
    price: Decimal,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            quantity: row.quantity,
            price: Price::new(row.price),
        }
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order header and return the stored row with its
    /// generated ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the checkout token was already
    /// used (an earlier attempt placed this order).
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO orders (user_id, total_price, status, checkout_token)
             VALUES ($1, $2, $3, $4)
             RETURNING id, user_id, total_price, status, checkout_token, created_at",
        )
        .bind(order.user_id.as_i32())
        .bind(order.total_price.amount())
        .bind(order.status.to_string())
        .bind(order.checkout_token.as_uuid())
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("checkout token already used".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    /// Find the order placed by a previous checkout attempt with this token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_checkout_token(
        &self,
        token: CheckoutToken,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, total_price, status, checkout_token, created_at
             FROM orders WHERE checkout_token = $1",
        )
        .bind(token.as_uuid())
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Insert order lines as a single batch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO order_items (order_id, product_id, quantity, price) ",
        );
        builder.push_values(items, |mut b, item| {
            b.push_bind(item.order_id.as_i32())
                .push_bind(item.product_id.as_i32())
                .push_bind(item.quantity)
                .push_bind(item.price.amount());
        });
        builder.build().execute(self.pool).await?;

        Ok(())
    }

    /// Delete an order header; its lines go with it via cascade.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// List a shopper's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, total_price, status, checkout_token, created_at
             FROM orders WHERE user_id = $1
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// Get one order, scoped to the owning shopper.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, total_price, status, checkout_token, created_at
             FROM orders WHERE id = $1 AND user_id = $2",
        )
        .bind(id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Lines of one order joined with their product names, for display.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_for_order(&self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            "SELECT oi.product_id, p.name, oi.quantity, oi.price
             FROM order_items oi
             JOIN products p ON p.id = oi.product_id
             WHERE oi.order_id = $1
             ORDER BY oi.product_id",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderLine::from).collect())
    }

    /// Count all orders, for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_all(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count orders in one lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_with_status(&self, status: OrderStatus) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
            .bind(status.to_string())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

impl CheckoutStore for OrderRepository<'_> {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        self.create(order).await
    }

    async fn find_by_checkout_token(
        &self,
        token: CheckoutToken,
    ) -> Result<Option<Order>, RepositoryError> {
        Self::find_by_checkout_token(self, token).await
    }

    async fn insert_order_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError> {
        self.insert_items(items).await
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError> {
        self.delete(id).await
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        CartRepository::new(self.pool).clear_for_user(user_id).await
    }
}
