//! Business logic services for the store API.
//!
//! # Services
//!
//! - `auth` - Password login, email verification, password reset
//! - `registration` - Registrations held in memory until verified
//! - `activity` - Inactivity timeout rules
//! - `checkout` - Order pricing from the catalog
//! - `email` - SMTP email with Askama templates
//! - `media` - Cloudinary image hosting

pub mod activity;
pub mod auth;
pub mod checkout;
pub mod email;
pub mod media;
pub mod registration;

pub use auth::{AuthError, AuthService};
pub use email::{EmailError, EmailService};
pub use media::{MediaError, MediaService};
pub use registration::{RegistrationError, RegistrationStore};
