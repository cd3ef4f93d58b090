//! Oxytoxin Core - Shared domain types.
//!
//! This crate provides the types used across the Oxytoxin components:
//! - `api` - The store HTTP API (public, admin, support chat)
//! - `cli` - Command-line tools for migrations, seeding and admin management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Database encoding is opt-in via the `postgres`
//! feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices, verification codes and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
