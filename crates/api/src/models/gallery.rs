//! Storefront gallery types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use oxytoxin_core::{GalleryImageId, UserId};

/// An image shown in the storefront gallery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: GalleryImageId,
    pub title: String,
    pub description: String,
    pub image_url: String,
    /// CDN identifier, used to delete the asset.
    pub public_id: String,
    pub uploaded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
