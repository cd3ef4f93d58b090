//! Shopping cart held on the user row.
//!
//! A line is identified by its product and color, so the same product in two
//! colors occupies two lines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use oxytoxin_core::{Price, ProductId};

use super::product::Product;

/// Errors from cart mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Quantity must be at least one when adding.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The product has no stock.
    #[error("{0} is out of stock")]
    OutOfStock(String),

    /// The requested quantity is more than is available.
    #[error("only {available} of {name} available")]
    ExceedsStock { name: String, available: u32 },

    /// The line being changed is not in the cart.
    #[error("item not found in cart")]
    NotInCart,
}

/// A single cart line with a snapshot of the product at the time it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    fn is_line(&self, product_id: ProductId, color: Option<&str>) -> bool {
        self.product_id == product_id && self.color.as_deref() == color
    }

    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// The cart as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub item_count: u32,
    pub subtotal: Price,
}

impl Cart {
    #[must_use]
    pub fn new(items: Vec<CartItem>) -> Self {
        let mut cart = Self {
            items,
            ..Self::default()
        };
        cart.recount();
        cart
    }

    fn recount(&mut self) {
        self.item_count = self.items.iter().map(|i| i.quantity).sum();
        self.subtotal = self.items.iter().map(CartItem::line_total).sum();
    }

    /// Total units of `product_id` across every color.
    fn units_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .filter(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .sum()
    }

    /// Add `quantity` units of a product, merging into an existing line.
    ///
    /// # Errors
    ///
    /// Fails if the quantity is zero, the product is out of stock, or the cart
    /// would then hold more units than are in stock.
    pub fn add(
        &mut self,
        product: &Product,
        quantity: u32,
        color: Option<String>,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !product.in_stock {
            return Err(CartError::OutOfStock(product.name.clone()));
        }
        let wanted = self.units_of(product.id).saturating_add(quantity);
        if wanted > product.stock {
            return Err(CartError::ExceedsStock {
                name: product.name.clone(),
                available: product.stock,
            });
        }

        if let Some(line) = self
            .items
            .iter_mut()
            .find(|i| i.is_line(product.id, color.as_deref()))
        {
            line.quantity += quantity;
            // Refresh the snapshot so the cart shows the current price
            line.price = product.price;
            line.name.clone_from(&product.name);
        } else {
            self.items.push(CartItem {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                image: product.main_image.clone(),
                color,
                quantity,
            });
        }
        self.recount();
        Ok(())
    }

    /// Set the quantity of an existing line; zero removes it.
    ///
    /// # Errors
    ///
    /// Fails if the line is not in the cart or the new quantity exceeds the
    /// product's stock.
    pub fn set_quantity(
        &mut self,
        product: &Product,
        color: Option<&str>,
        quantity: u32,
    ) -> Result<(), CartError> {
        let index = self
            .items
            .iter()
            .position(|i| i.is_line(product.id, color))
            .ok_or(CartError::NotInCart)?;

        if quantity == 0 {
            self.items.remove(index);
            self.recount();
            return Ok(());
        }

        let other_lines = self.units_of(product.id) - self.items.get(index).map_or(0, |i| i.quantity);
        if other_lines.saturating_add(quantity) > product.stock {
            return Err(CartError::ExceedsStock {
                name: product.name.clone(),
                available: product.stock,
            });
        }

        if let Some(line) = self.items.get_mut(index) {
            line.quantity = quantity;
        }
        self.recount();
        Ok(())
    }

    /// Remove lines for a product. With no color, every color is removed.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, product_id: ProductId, color: Option<&str>) -> bool {
        let before = self.items.len();
        self.items.retain(|i| match color {
            Some(_) => !i.is_line(product_id, color),
            None => i.product_id != product_id,
        });
        let removed = self.items.len() != before;
        self.recount();
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.recount();
    }
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
            name: format!("Tee {id}"),
            price: Price::from_cents(cents),
            description: "Heavyweight cotton".to_string(),
            category: "tees".to_string(),
            stock,
            in_stock: stock > 0,
            colors: vec!["black".to_string(), "bone".to_string()],
            main_image: format!("https://cdn.example.com/{id}.jpg"),
            images: Vec::new(),
            features: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_add_merges_same_line() {
        let tee = product(1, 10, 2500);
        let mut cart = Cart::default();
        cart.add(&tee, 2, Some("black".into())).unwrap();
        cart.add(&tee, 1, Some("black".into())).unwrap();
        cart.add(&tee, 1, Some("bone".into())).unwrap();

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.item_count, 4);
        assert_eq!(cart.subtotal, Price::from_cents(10000));
    }

    #[test]
    fn test_add_respects_stock_across_colors() {
        let tee = product(1, 3, 2500);
        let mut cart = Cart::default();
        cart.add(&tee, 2, Some("black".into())).unwrap();
        let err = cart.add(&tee, 2, Some("bone".into())).unwrap_err();
        assert_eq!(
            err,
            CartError::ExceedsStock {
                name: "Tee 1".into(),
                available: 3
            }
        );
        assert_eq!(cart.item_count, 2);
    }

    #[test]
    fn test_add_rejects_out_of_stock_and_zero() {
        let mut cart = Cart::default();
        assert_eq!(
            cart.add(&product(2, 0, 1000), 1, None),
            Err(CartError::OutOfStock("Tee 2".into()))
        );
        assert_eq!(
            cart.add(&product(3, 5, 1000), 0, None),
            Err(CartError::InvalidQuantity)
        );
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let tee = product(1, 10, 2500);
        let mut cart = Cart::default();
        cart.add(&tee, 2, None).unwrap();
        cart.set_quantity(&tee, None, 5).unwrap();
        assert_eq!(cart.item_count, 5);

        cart.set_quantity(&tee, None, 0).unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.subtotal, Price::ZERO);

        assert_eq!(cart.set_quantity(&tee, None, 1), Err(CartError::NotInCart));
    }

    #[test]
    fn test_remove_with_and_without_color() {
        let tee = product(1, 10, 2500);
        let cap = product(2, 10, 1500);
        let mut cart = Cart::default();
        cart.add(&tee, 1, Some("black".into())).unwrap();
        cart.add(&tee, 1, Some("bone".into())).unwrap();
        cart.add(&cap, 1, None).unwrap();

        assert!(cart.remove(tee.id, Some("bone")));
        assert_eq!(cart.items.len(), 2);
        assert!(cart.remove(tee.id, None));
        assert_eq!(cart.items.len(), 1);
        assert!(!cart.remove(tee.id, None));

        cart.clear();
        assert_eq!(cart, Cart::default());
    }

    #[test]
    fn test_cart_item_json_shape() {
        let item = CartItem {
            product_id: ProductId::new(9),
            name: "Cap".into(),
            price: Price::from_cents(1850),
            image: "cap.jpg".into(),
            color: None,
            quantity: 2,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["productId"], 9);
        assert_eq!(json["price"], 18.5);
        assert!(json.get("color").is_none());

        let back: CartItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
