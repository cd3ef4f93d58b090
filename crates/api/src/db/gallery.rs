//! Gallery image repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use oxytoxin_core::{GalleryImageId, UserId};

use super::RepositoryError;
use crate::models::gallery::GalleryImage;

const GALLERY_COLUMNS: &str =
    "id, title, description, image_url, public_id, uploaded_by, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct GalleryRow {
    id: i32,
    title: String,
    description: String,
    image_url: String,
    public_id: String,
    uploaded_by: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GalleryRow> for GalleryImage {
    fn from(row: GalleryRow) -> Self {
        Self {
            id: GalleryImageId::new(row.id),
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            public_id: row.public_id,
            uploaded_by: row.uploaded_by.map(UserId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Parameters for recording an uploaded gallery image.
#[derive(Debug, Clone)]
pub struct NewGalleryImage {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub public_id: String,
    pub uploaded_by: UserId,
}

/// Repository for gallery images.
pub struct GalleryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GalleryRepository<'a> {
    /// Create a new gallery repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All images, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<GalleryImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, GalleryRow>(&format!(
            "SELECT {GALLERY_COLUMNS} FROM gallery_images ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(GalleryImage::from).collect())
    }

    /// Record an uploaded image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, image: &NewGalleryImage) -> Result<GalleryImage, RepositoryError> {
        let row = sqlx::query_as::<_, GalleryRow>(&format!(
            r"
            INSERT INTO gallery_images (title, description, image_url, public_id, uploaded_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {GALLERY_COLUMNS}
            "
        ))
        .bind(&image.title)
        .bind(&image.description)
        .bind(&image.image_url)
        .bind(&image.public_id)
        .bind(image.uploaded_by)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Delete an image, returning the removed row so its CDN asset can be
    /// destroyed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: GalleryImageId) -> Result<Option<GalleryImage>, RepositoryError> {
        let row = sqlx::query_as::<_, GalleryRow>(&format!(
            "DELETE FROM gallery_images WHERE id = $1 RETURNING {GALLERY_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(GalleryImage::from))
    }
}
