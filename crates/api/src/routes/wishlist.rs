//! Wishlist routes.

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use oxytoxin_core::ProductId;

use crate::db::{ProductRepository, WishlistRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::WishlistItem;
use crate::response::{ApiJson, ApiPath, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WishlistItems {
    pub items: Vec<WishlistItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistCheck {
    pub is_in_wishlist: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToWishlist {
    pub product_id: ProductId,
}

/// GET /api/wishlist
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<WishlistItems>> {
    let items = WishlistRepository::new(state.pool()).list(user.id).await?;
    let empty = items.is_empty();
    let response = ApiResponse::ok(WishlistItems { items });
    Ok(if empty {
        response.with_message("Wishlist is empty")
    } else {
        response
    })
}

/// POST /api/wishlist/add
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(form): ApiJson<AddToWishlist>,
) -> Result<ApiResponse<WishlistItems>> {
    let product = ProductRepository::new(state.pool())
        .get(form.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let repo = WishlistRepository::new(state.pool());
    repo.add(user.id, &product).await?;
    let items = repo.list(user.id).await?;

    Ok(ApiResponse::ok(WishlistItems { items })
        .with_status(StatusCode::CREATED)
        .with_message("Item added to wishlist"))
}

/// DELETE /api/wishlist/remove/{productId}
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<ApiResponse<WishlistItems>> {
    let repo = WishlistRepository::new(state.pool());
    if !repo.remove(user.id, product_id).await? {
        return Err(AppError::NotFound("Item not found in wishlist".to_string()));
    }
    let items = repo.list(user.id).await?;

    Ok(ApiResponse::ok(WishlistItems { items }).with_message("Item removed from wishlist"))
}

/// DELETE /api/wishlist/clear
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<WishlistItems>> {
    let removed = WishlistRepository::new(state.pool()).clear(user.id).await?;
    tracing::debug!(user_id = %user.id, removed, "Wishlist cleared");

    Ok(ApiResponse::ok(WishlistItems { items: Vec::new() }).with_message("Wishlist cleared"))
}

/// GET /api/wishlist/check/{productId}
pub async fn check(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<ApiResponse<WishlistCheck>> {
    let is_in_wishlist = WishlistRepository::new(state.pool())
        .contains(user.id, product_id)
        .await?;
    Ok(ApiResponse::ok(WishlistCheck { is_in_wishlist }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_shape() {
        let body = serde_json::to_value(WishlistCheck {
            is_in_wishlist: true,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "isInWishlist": true }));
    }
}
