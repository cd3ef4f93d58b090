//! Catalog product types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oxytoxin_core::{Price, ProductId};

/// A product in the catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub description: String,
    pub category: String,
    pub stock: u32,
    /// Derived from `stock > 0`.
    pub in_stock: bool,
    pub colors: Vec<String>,
    pub main_image: String,
    pub images: Vec<String>,
    pub features: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: Price,
    pub description: String,
    pub category: String,
    pub stock: u32,
    #[serde(default)]
    pub colors: Vec<String>,
    pub main_image: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

impl NewProduct {
    /// Trim text fields and reject blanks.
    ///
    /// # Errors
    ///
    /// Returns the name of the first required field that is blank.
    pub fn normalize(mut self) -> Result<Self, &'static str> {
        self.name = required(&self.name, "name")?;
        self.description = required(&self.description, "description")?;
        self.category = required(&self.category, "category")?;
        self.main_image = required(&self.main_image, "mainImage")?;
        self.colors = clean_list(self.colors);
        self.images = clean_list(self.images);
        self.features = clean_list(self.features);
        Ok(self)
    }
}

/// A partial product update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<Price>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub stock: Option<u32>,
    pub colors: Option<Vec<String>>,
    pub main_image: Option<String>,
    pub images: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
}

impl ProductUpdate {
    /// Trim provided text fields and reject provided blanks.
    ///
    /// # Errors
    ///
    /// Returns the name of the first provided field that is blank.
    pub fn normalize(mut self) -> Result<Self, &'static str> {
        self.name = self.name.map(|v| required(&v, "name")).transpose()?;
        self.description = self
            .description
            .map(|v| required(&v, "description"))
            .transpose()?;
        self.category = self.category.map(|v| required(&v, "category")).transpose()?;
        self.main_image = self
            .main_image
            .map(|v| required(&v, "mainImage"))
            .transpose()?;
        self.colors = self.colors.map(clean_list);
        self.images = self.images.map(clean_list);
        self.features = self.features.map(clean_list);
        Ok(self)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.stock.is_none()
            && self.colors.is_none()
            && self.main_image.is_none()
            && self.images.is_none()
            && self.features.is_none()
    }
}

/// Query-string filters for the product listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub category: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    /// Only `true` filters; `false` or absent lists everything.
    pub in_stock: Option<bool>,
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
}

impl ProductFilter {
    /// Drop blank string filters so `?category=` behaves like no filter.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        self.category = non_blank(self.category);
        self.search = non_blank(self.search);
        self
    }
}

fn required(value: &str, field: &'static str) -> Result<String, &'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(field)
    } else {
        Ok(trimmed.to_string())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
