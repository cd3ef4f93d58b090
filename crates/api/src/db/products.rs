//! Product catalog repository.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use oxytoxin_core::{Price, ProductId};

use super::{RepositoryError, to_i32, to_u32};
use crate::models::product::{NewProduct, Product, ProductFilter, ProductUpdate};

const PRODUCT_COLUMNS: &str = "id, name, price, description, category, stock, in_stock, colors, \
     main_image, images, features, created_at, updated_at";

const DUPLICATE_NAME: &str = "A product with this name already exists";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    price: Price,
    description: String,
    category: String,
    stock: i32,
    in_stock: bool,
    colors: Vec<String>,
    main_image: String,
    images: Vec<String>,
    features: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            description: row.description,
            category: row.category,
            stock: to_u32(row.stock, "stock")?,
            in_stock: row.in_stock,
            colors: row.colors,
            main_image: row.main_image,
            images: row.images,
            features: row.features,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"
        ));
        push_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get every product whose ID is in `ids`. Unknown IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken (ignoring case).
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products (
                name, price, description, category, stock, colors, main_image, images, features
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.category)
        .bind(to_i32(product.stock, "stock")?)
        .bind(&product.colors)
        .bind(&product.main_image)
        .bind(&product.images)
        .bind(&product.features)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, DUPLICATE_NAME))?;

        row.try_into()
    }

    /// Apply a partial update. `in_stock` follows the new stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let stock = update.stock.map(|s| to_i32(s, "stock")).transpose()?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                description = COALESCE($4, description),
                category = COALESCE($5, category),
                stock = COALESCE($6, stock),
                colors = COALESCE($7, colors),
                main_image = COALESCE($8, main_image),
                images = COALESCE($9, images),
                features = COALESCE($10, features),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.name)
        .bind(update.price)
        .bind(&update.description)
        .bind(&update.category)
        .bind(stock)
        .bind(&update.colors)
        .bind(&update.main_image)
        .bind(&update.images)
        .bind(&update.features)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, DUPLICATE_NAME))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a product.
    ///
    /// Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a product unless one with the same name exists.
    ///
    /// Returns whether the product was inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_if_absent(&self, product: &NewProduct) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO products (
                name, price, description, category, stock, colors, main_image, images, features
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.category)
        .bind(to_i32(product.stock, "stock")?)
        .bind(&product.colors)
        .bind(&product.main_image)
        .bind(&product.images)
        .bind(&product.features)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the whole catalog. Returns the number of products removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM products")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Append `AND ...` clauses for each filter that is set.
fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if let Some(category) = &filter.category {
        query.push(" AND LOWER(category) = LOWER(");
        query.push_bind(category.clone());
        query.push(")");
    }
    if let Some(min) = filter.min_price {
        query.push(" AND price >= ");
        query.push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query.push(" AND price <= ");
        query.push_bind(max);
    }
    if filter.in_stock == Some(true) {
        query.push(" AND in_stock");
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        query.push(" AND (name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_for(filter: &ProductFilter) -> String {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM products WHERE TRUE");
        push_filters(&mut query, filter);
        query.sql().to_string()
    }

    #[test]
    fn test_no_filters() {
        assert_eq!(
            sql_for(&ProductFilter::default()),
            "SELECT 1 FROM products WHERE TRUE"
        );
    }

    #[test]
    fn test_all_filters_bind_in_order() {
        let filter = ProductFilter {
            category: Some("tees".into()),
            min_price: Some(Price::from_cents(1000)),
            max_price: Some(Price::from_cents(5000)),
            in_stock: Some(true),
            search: Some("skull".into()),
        };
        assert_eq!(
            sql_for(&filter),
            "SELECT 1 FROM products WHERE TRUE AND LOWER(category) = LOWER($1) \
             AND price >= $2 AND price <= $3 AND in_stock \
             AND (name ILIKE $4 OR description ILIKE $5)"
        );
    }

    #[test]
    fn test_in_stock_false_is_ignored() {
        let filter = ProductFilter {
            in_stock: Some(false),
            ..ProductFilter::default()
        };
        assert!(!sql_for(&filter).contains("in_stock"));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
