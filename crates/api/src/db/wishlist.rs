//! Wishlist repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use oxytoxin_core::{Price, ProductId, UserId, WishlistItemId};

use super::RepositoryError;
use crate::models::product::Product;
use crate::models::wishlist::WishlistItem;

const WISHLIST_COLUMNS: &str = "id, user_id, product_id, product_name, product_price, \
     product_image, product_description, product_category, in_stock, added_at";

#[derive(Debug, sqlx::FromRow)]
struct WishlistRow {
    id: i32,
    user_id: i32,
    product_id: i32,
    product_name: String,
    product_price: Price,
    product_image: String,
    product_description: String,
    product_category: String,
    in_stock: bool,
    added_at: DateTime<Utc>,
}

impl From<WishlistRow> for WishlistItem {
    fn from(row: WishlistRow) -> Self {
        Self {
            id: WishlistItemId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            product_price: row.product_price,
            product_image: row.product_image,
            product_description: row.product_description,
            product_category: row.product_category,
            in_stock: row.in_stock,
            added_at: row.added_at,
        }
    }
}

/// Repository for wishlist items.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's wishlist, most recently added first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, WishlistRow>(&format!(
            "SELECT {WISHLIST_COLUMNS} FROM wishlist_items WHERE user_id = $1 ORDER BY added_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(WishlistItem::from).collect())
    }

    /// Save a product with a snapshot of its current details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product is already saved.
    pub async fn add(
        &self,
        user_id: UserId,
        product: &Product,
    ) -> Result<WishlistItem, RepositoryError> {
        let row = sqlx::query_as::<_, WishlistRow>(&format!(
            r"
            INSERT INTO wishlist_items (
                user_id, product_id, product_name, product_price, product_image,
                product_description, product_category, in_stock
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {WISHLIST_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.main_image)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.in_stock)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "Product already in wishlist"))?;

        Ok(row.into())
    }

    /// Remove a product. Returns whether it was saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every item. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Whether a product is on the user's wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM wishlist_items WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }
}
