//! Gallery routes.

use axum::extract::{Multipart, State};

use oxytoxin_core::GalleryImageId;

use crate::db::GalleryRepository;
use crate::db::gallery::NewGalleryImage;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::GalleryImage;
use crate::response::{ApiPath, ApiResponse};
use crate::routes::upload::UploadForm;
use crate::services::MediaError;
use crate::state::AppState;

/// Gallery images, newest first.
///
/// GET /api/public/gallery
pub async fn index(State(state): State<AppState>) -> Result<ApiResponse<Vec<GalleryImage>>> {
    let images = GalleryRepository::new(state.pool()).list().await?;
    Ok(ApiResponse::ok(images))
}

/// GET /api/admin/gallery
pub async fn admin_index(
    state: State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<ApiResponse<Vec<GalleryImage>>> {
    index(state).await
}

/// Upload an image to the gallery.
///
/// POST /api/admin/gallery (multipart `image`, `title`, `description`)
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    multipart: Multipart,
) -> Result<ApiResponse<GalleryImage>> {
    if !state.media().is_enabled() {
        return Err(MediaError::Disabled.into());
    }

    let form = UploadForm::read(multipart, "image", 1).await?;
    let title = form.field("title");
    let description = form.field("description");
    let image = form.into_first_image().ok_or(MediaError::NoFiles)?;

    let uploaded = state.media().upload(image).await?;
    let image = GalleryRepository::new(state.pool())
        .create(&NewGalleryImage {
            title,
            description,
            image_url: uploaded.url,
            public_id: uploaded.public_id,
            uploaded_by: admin.id,
        })
        .await?;

    tracing::info!(image_id = %image.id, admin_id = %admin.id, "Gallery image uploaded");
    Ok(ApiResponse::created(image).with_message("Gallery image uploaded successfully"))
}

/// Delete a gallery image and, best effort, its CDN asset.
///
/// DELETE /api/admin/gallery/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<GalleryImageId>,
) -> Result<ApiResponse<()>> {
    let image = GalleryRepository::new(state.pool())
        .delete(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Gallery image not found".to_string()))?;

    if !image.public_id.is_empty()
        && let Err(e) = state.media().destroy(&image.public_id).await
    {
        tracing::warn!(error = %e, public_id = %image.public_id, "Failed to delete CDN image");
    }

    tracing::info!(image_id = %id, admin_id = %admin.id, "Gallery image deleted");
    Ok(ApiResponse::message("Gallery image deleted successfully"))
}
