//! Cart routes. The cart lives on the user row.

use axum::extract::State;
use serde::Deserialize;

use oxytoxin_core::{ProductId, UserId};

use crate::db::{ProductRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::{Cart, CartError, Product};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
    pub color: Option<String>,
}

const fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItem {
    pub product_id: ProductId,
    pub color: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ColorQuery {
    pub color: Option<String>,
}

async fn load_product(state: &AppState, id: ProductId) -> Result<Option<Product>> {
    Ok(ProductRepository::new(state.pool()).get(id).await?)
}

async fn save(state: &AppState, user_id: UserId, cart: &Cart) -> Result<()> {
    UserRepository::new(state.pool())
        .save_cart(user_id, &cart.items)
        .await?;
    Ok(())
}

/// GET /api/public/cart
pub async fn show(RequireUser(user): RequireUser) -> ApiResponse<Cart> {
    ApiResponse::ok(Cart::new(user.cart))
}

/// Add a product, merging with an existing line of the same color.
///
/// POST /api/public/cart
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(item): ApiJson<AddItem>,
) -> Result<ApiResponse<Cart>> {
    let product = load_product(&state, item.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let mut cart = Cart::new(user.cart);
    cart.add(&product, item.quantity, item.color)?;
    save(&state, user.id, &cart).await?;

    Ok(ApiResponse::ok(cart).with_message("Item added to cart"))
}

/// Set a line's quantity; zero removes it.
///
/// PATCH /api/public/cart
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(item): ApiJson<UpdateItem>,
) -> Result<ApiResponse<Cart>> {
    let mut cart = Cart::new(user.cart);
    let color = item.color.as_deref();

    match load_product(&state, item.product_id).await? {
        Some(product) => cart.set_quantity(&product, color, item.quantity)?,
        // A deleted product can still be taken out of the cart
        None if item.quantity == 0 => {
            if !cart.remove(item.product_id, color) {
                return Err(CartError::NotInCart.into());
            }
        }
        None => return Err(AppError::NotFound("Product not found".to_string())),
    }
    save(&state, user.id, &cart).await?;

    Ok(ApiResponse::ok(cart).with_message("Cart updated"))
}

/// Remove a product. Without `color`, every color of it goes.
///
/// DELETE /api/public/cart/{productId}?color=
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiQuery(query): ApiQuery<ColorQuery>,
) -> Result<ApiResponse<Cart>> {
    let mut cart = Cart::new(user.cart);
    if !cart.remove(product_id, query.color.as_deref()) {
        return Err(CartError::NotInCart.into());
    }
    save(&state, user.id, &cart).await?;

    Ok(ApiResponse::ok(cart).with_message("Item removed from cart"))
}

/// DELETE /api/public/cart
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<Cart>> {
    let mut cart = Cart::new(user.cart);
    cart.clear();
    save(&state, user.id, &cart).await?;

    Ok(ApiResponse::ok(cart).with_message("Cart cleared"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_defaults() {
        let item: AddItem =
            serde_json::from_value(serde_json::json!({ "productId": 7 })).unwrap();
        assert_eq!(item.product_id, ProductId::new(7));
        assert_eq!(item.quantity, 1);
        assert!(item.color.is_none());
    }

    #[test]
    fn test_update_item_requires_quantity() {
        let result: std::result::Result<UpdateItem, _> =
            serde_json::from_value(serde_json::json!({ "productId": 7 }));
        assert!(result.is_err());
    }
}
