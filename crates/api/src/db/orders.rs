//! Order repository.
//!
//! Status changes run in a transaction that locks the order row, so two
//! concurrent confirmations cannot both decrement stock.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use oxytoxin_core::{Email, OrderId, OrderStatus, Price, UserId};

use super::{RepositoryError, to_i32};
use crate::models::delivery::DeliverySnapshot;
use crate::models::order::{Order, OrderItem};

const ORDER_COLUMNS: &str = "id, user_id, user_email, items, total_amount, status, payment_ref, \
     delivery, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    user_email: String,
    items: Json<Vec<OrderItem>>,
    total_amount: Price,
    status: OrderStatus,
    payment_ref: Option<String>,
    delivery: Option<Json<DeliverySnapshot>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let user_email = Email::parse(&row.user_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            user_email,
            items: row.items.0,
            total_amount: row.total_amount,
            status: row.status,
            payment_ref: row.payment_ref,
            delivery: row.delivery.map(|d| d.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Parameters for inserting an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub user_email: Email,
    pub items: Vec<OrderItem>,
    pub total_amount: Price,
    pub delivery: Option<DeliverySnapshot>,
}

/// Result of a requested status change.
#[derive(Debug, Clone)]
pub enum Transition {
    /// The change was saved.
    Applied {
        order: Order,
        previous: OrderStatus,
    },
    /// The order's current status does not allow the change.
    Rejected { current: OrderStatus },
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

    /// Insert a `pending` order, optionally emptying the user's cart in the
    /// same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, order: &NewOrder, clear_cart: bool) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (user_id, user_email, items, total_amount, delivery)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(&order.user_email)
        .bind(Json(&order.items))
        .bind(order.total_amount)
        .bind(order.delivery.as_ref().map(Json))
        .fetch_one(&mut *tx)
        .await?;

        if clear_cart {
            sqlx::query("UPDATE users SET cart = '[]'::jsonb, updated_at = NOW() WHERE id = $1")
                .bind(order.user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        row.try_into()
    }

    /// Orders placed by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// Get an order, restricted to its owner when `owner` is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: OrderId,
        owner: Option<UserId>,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND ($2::INTEGER IS NULL OR user_id = $2)"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Delete an order.
    ///
    /// Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Move an order to `next`, validating the transition.
    ///
    /// When the change confirms payment, each item's stock is reduced by the
    /// ordered quantity (never below zero) in the same transaction. A new
    /// `payment_ref` replaces the stored one; `None` keeps it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order matches (or it belongs
    /// to someone other than `owner`).
    pub async fn transition(
        &self,
        id: OrderId,
        owner: Option<UserId>,
        next: OrderStatus,
        payment_ref: Option<&str>,
    ) -> Result<Transition, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE id = $1 AND ($2::INTEGER IS NULL OR user_id = $2)
            FOR UPDATE
            "
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let previous = current.status;
        if !previous.can_transition_to(next) {
            return Ok(Transition::Rejected { current: previous });
        }

        if previous.confirms_payment(next) {
            for item in &current.items.0 {
                sqlx::query(
                    r"
                    UPDATE products
                    SET stock = GREATEST(stock - $2, 0), updated_at = NOW()
                    WHERE id = $1
                    ",
                )
                .bind(item.product_id)
                .bind(to_i32(item.quantity, "quantity")?)
                .execute(&mut *tx)
                .await?;
            }
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = $2,
                payment_ref = COALESCE($3, payment_ref),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(next)
        .bind(payment_ref)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Transition::Applied {
            order: row.try_into()?,
            previous,
        })
    }
}
