//! Domain models for the store API.
//!
//! These are validated domain types, separate from the database row types in
//! [`crate::db`]. They serialize with camelCase field names for the JSON API.

pub mod cart;
pub mod conversation;
pub mod delivery;
pub mod gallery;
pub mod order;
pub mod product;
pub mod session;
pub mod user;
pub mod wishlist;

pub use cart::{Cart, CartError, CartItem};
pub use conversation::{Conversation, ConversationSummary, ConversationThread, Message};
pub use delivery::{DeliveryInfo, DeliveryInput, DeliverySnapshot, DeliveryWithUser};
pub use gallery::GalleryImage;
pub use order::{Order, OrderItem};
pub use product::{NewProduct, Product, ProductFilter, ProductUpdate};
pub use session::{CurrentUser, keys as session_keys};
pub use user::{StoredCode, User};
pub use wishlist::WishlistItem;
