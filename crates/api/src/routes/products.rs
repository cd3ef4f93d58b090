//! Catalog routes, public and admin.

use axum::extract::{Multipart, State};

use oxytoxin_core::ProductId;

use crate::db::{ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Product, ProductFilter, ProductUpdate};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse};
use crate::routes::upload::UploadForm;
use crate::services::media::UploadedImage;
use crate::state::AppState;

/// Most images accepted by one upload request.
const MAX_UPLOAD_FILES: usize = 4;

fn not_found() -> AppError {
    AppError::NotFound("Product not found".to_string())
}

// =============================================================================
// Public
// =============================================================================

/// List products, newest first.
///
/// GET /api/public/products?category=&minPrice=&maxPrice=&inStock=&search=
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> Result<ApiResponse<Vec<Product>>> {
    let products = ProductRepository::new(state.pool())
        .list(&filter.normalize())
        .await?;
    Ok(ApiResponse::ok(products))
}

/// GET /api/public/products/{id}
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiResponse<Product>> {
    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(product))
}

/// GET /api/public/products/category/{category}
pub async fn by_category(
    State(state): State<AppState>,
    ApiPath(category): ApiPath<String>,
) -> Result<ApiResponse<Vec<Product>>> {
    let filter = ProductFilter {
        category: Some(category),
        ..ProductFilter::default()
    };
    let products = ProductRepository::new(state.pool())
        .list(&filter.normalize())
        .await?;
    Ok(ApiResponse::ok(products))
}

// =============================================================================
// Admin
// =============================================================================

/// GET /api/admin/products
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<ApiResponse<Vec<Product>>> {
    let products = ProductRepository::new(state.pool())
        .list(&ProductFilter::default())
        .await?;
    Ok(ApiResponse::ok(products))
}

/// POST /api/admin/products
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(product): ApiJson<NewProduct>,
) -> Result<ApiResponse<Product>> {
    let product = product
        .normalize()
        .map_err(|field| AppError::BadRequest(format!("{field} is required")))?;

    let product = ProductRepository::new(state.pool()).create(&product).await?;
    tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product created");

    Ok(ApiResponse::created(product).with_message("Product created successfully"))
}

/// PATCH /api/admin/products/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(update): ApiJson<ProductUpdate>,
) -> Result<ApiResponse<Product>> {
    let update = update
        .normalize()
        .map_err(|field| AppError::BadRequest(format!("{field} cannot be blank")))?;
    if update.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let product = ProductRepository::new(state.pool())
        .update(id, &update)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => not_found(),
            other => other.into(),
        })?;
    tracing::info!(product_id = %id, admin_id = %admin.id, "Product updated");

    Ok(ApiResponse::ok(product).with_message("Product updated successfully"))
}

/// DELETE /api/admin/products/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiResponse<()>> {
    if !ProductRepository::new(state.pool()).delete(id).await? {
        return Err(not_found());
    }
    tracing::info!(product_id = %id, admin_id = %admin.id, "Product deleted");
    Ok(ApiResponse::message("Product deleted successfully"))
}

/// Upload product images to the CDN.
///
/// POST /api/admin/upload (multipart, field `images`, 1 to 4 files)
pub async fn upload(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    multipart: Multipart,
) -> Result<ApiResponse<Vec<UploadedImage>>> {
    // Fail before reading the body when uploads are off
    if !state.media().is_enabled() {
        return Err(crate::services::MediaError::Disabled.into());
    }

    let form = UploadForm::read(multipart, "images", MAX_UPLOAD_FILES).await?;
    let count = form.images.len();

    let mut uploaded = Vec::with_capacity(count);
    for image in form.images {
        uploaded.push(state.media().upload(image).await?);
    }

    Ok(ApiResponse::ok(uploaded).with_message(format!("{count} image(s) uploaded successfully")))
}
