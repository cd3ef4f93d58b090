//! Wishlist types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use oxytoxin_core::{Price, ProductId, UserId, WishlistItemId};

/// A saved product with the details it had when it was saved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Price,
    pub product_image: String,
    pub product_description: String,
    pub product_category: String,
    pub in_stock: bool,
    pub added_at: DateTime<Utc>,
}
