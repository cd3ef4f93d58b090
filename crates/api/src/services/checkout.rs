//! Order pricing.
//!
//! Clients say what they want; prices, names, and images always come from
//! the catalog at checkout time.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use oxytoxin_core::{Price, ProductId};

use crate::models::cart::CartItem;
use crate::models::order::OrderItem;
use crate::models::product::Product;

/// Errors that make an order impossible to place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Order must contain at least one item")]
    Empty,

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Product {0} not found")]
    UnknownProduct(ProductId),

    #[error("{0} is out of stock")]
    OutOfStock(String),

    #[error("Only {available} of {name} available")]
    ExceedsStock { name: String, available: u32 },
}

/// A requested order line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub color: Option<String>,
}

const fn one() -> u32 {
    1
}

impl From<&CartItem> for CheckoutLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            color: item.color.clone(),
        }
    }
}

/// Price the requested lines against the catalog.
///
/// `catalog` must contain every product that exists among the requested IDs;
/// anything missing is reported as unknown. Quantities of the same product
/// in different colors are added together for the stock check.
///
/// # Errors
///
/// Returns a [`CheckoutError`] describing the first line that cannot be
/// fulfilled.
pub fn price_order(
    lines: &[CheckoutLine],
    catalog: &[Product],
) -> Result<(Vec<OrderItem>, Price), CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::Empty);
    }

    let products: HashMap<ProductId, &Product> = catalog.iter().map(|p| (p.id, p)).collect();
    let mut wanted: HashMap<ProductId, u32> = HashMap::new();
    let mut items = Vec::with_capacity(lines.len());

    for line in lines {
        if line.quantity == 0 {
            return Err(CheckoutError::InvalidQuantity);
        }
        let product = products
            .get(&line.product_id)
            .ok_or(CheckoutError::UnknownProduct(line.product_id))?;
        if !product.in_stock {
            return Err(CheckoutError::OutOfStock(product.name.clone()));
        }

        let total = wanted.entry(product.id).or_default();
        *total = total.saturating_add(line.quantity);
        if *total > product.stock {
            return Err(CheckoutError::ExceedsStock {
                name: product.name.clone(),
                available: product.stock,
            });
        }

        items.push(OrderItem {
            product_id: product.id,
            name: product.name.clone(),
            image: product.main_image.clone(),
            price: product.price,
            color: line.color.clone(),
            quantity: line.quantity,
        });
    }

    let total = items.iter().map(OrderItem::line_total).sum();
    Ok((items, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(id: i32, stock: u32, cents: u32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Item {id}"),
            price: Price::from_cents(cents),
            description: "d".into(),
            category: "c".into(),
            stock,
            in_stock: stock > 0,
            colors: Vec::new(),
            main_image: format!("{id}.jpg"),
            images: Vec::new(),
            features: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn line(id: i32, quantity: u32, color: Option<&str>) -> CheckoutLine {
        CheckoutLine {
            product_id: ProductId::new(id),
            quantity,
            color: color.map(String::from),
        }
    }

    #[test]
    fn test_prices_come_from_catalog() {
        let catalog = vec![product(1, 5, 2000), product(2, 5, 999)];
        let (items, total) =
            price_order(&[line(1, 2, Some("red")), line(2, 1, None)], &catalog).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].price, Price::from_cents(2000));
        assert_eq!(items[0].image, "1.jpg");
        assert_eq!(total, Price::from_cents(4999));
    }

    #[test]
    fn test_rejects_unknown_and_out_of_stock() {
        let catalog = vec![product(1, 0, 2000)];
        assert_eq!(
            price_order(&[line(9, 1, None)], &catalog).unwrap_err(),
            CheckoutError::UnknownProduct(ProductId::new(9))
        );
        assert_eq!(
            price_order(&[line(1, 1, None)], &catalog).unwrap_err(),
            CheckoutError::OutOfStock("Item 1".into())
        );
    }

    #[test]
    fn test_stock_is_checked_across_colors() {
        let catalog = vec![product(1, 3, 2000)];
        assert_eq!(
            price_order(&[line(1, 2, Some("red")), line(1, 2, Some("blue"))], &catalog)
                .unwrap_err(),
            CheckoutError::ExceedsStock {
                name: "Item 1".into(),
                available: 3
            }
        );
    }

    #[test]
    fn test_rejects_empty_and_zero_quantity() {
        let catalog = vec![product(1, 3, 2000)];
        assert_eq!(price_order(&[], &catalog).unwrap_err(), CheckoutError::Empty);
        assert_eq!(
            price_order(&[line(1, 0, None)], &catalog).unwrap_err(),
            CheckoutError::InvalidQuantity
        );
    }

    #[test]
    fn test_line_quantity_defaults_to_one() {
        let parsed: CheckoutLine =
            serde_json::from_value(serde_json::json!({ "productId": 4 })).unwrap();
        assert_eq!(parsed, line(4, 1, None));
    }
}
