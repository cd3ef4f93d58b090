//! HTTP route handlers for the store API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                   - Welcome and endpoint groups
//! GET  /health                             - Liveness
//! GET  /health/ready                       - Readiness (database)
//!
//! # Auth (/api/auth)
//! POST /register | /verify-email | /resend-code | /login   (rate limited)
//! POST /forgot-password | /reset-password                  (rate limited)
//! POST /logout; GET /me | /activity-config
//!
//! # Public (/api/public)
//! GET  /products, /products/{id}, /products/category/{category}, /gallery
//! GET|PATCH /profile; POST /change-password, /profile-picture
//! GET|POST|PATCH|DELETE /cart; DELETE /cart/{productId}?color=
//! GET|POST /orders; GET /orders/{id}; POST /verify-payment
//!
//! # Admin (/api/admin)
//! GET|POST /products; PATCH|DELETE /products/{id}; POST /upload
//! GET|POST /users; PATCH|DELETE /users/{id}; POST /test-email
//! GET /orders; PATCH|DELETE /orders/{id}
//! GET|POST /gallery; DELETE /gallery/{id}
//!
//! # Delivery (/api/delivery)
//! POST /save; GET /get, /admin/all, /admin/user/{userId}
//!
//! # Support chat (/api/messages)
//! GET /conversation, /unread-count; POST /send; PATCH /mark-read
//! POST /admin/reply; GET /admin/conversations; PATCH /admin/close
//!
//! # Wishlist (/api/wishlist)
//! GET /; POST /add; DELETE /remove/{productId}, /clear; GET /check/{productId}
//! ```

pub mod auth;
pub mod cart;
pub mod delivery;
pub mod gallery;
pub mod messages;
pub mod orders;
pub mod products;
pub mod profile;
pub mod upload;
pub mod users;
pub mod wishlist;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use serde_json::{Value, json};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
///
/// Only the endpoints that take credentials or codes are rate limited;
/// session reads stay unthrottled.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/verify-email", post(auth::verify_email))
        .route("/resend-code", post(auth::resend_code))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .layer(auth_rate_limiter())
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/activity-config", get(auth::activity_config))
}

/// Create the public (customer) routes router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/products/category/{category}", get(products::by_category))
        .route("/gallery", get(gallery::index))
        .route("/profile", get(profile::show).patch(profile::update))
        .route("/change-password", post(profile::change_password))
        .route("/profile-picture", post(profile::upload_picture))
        .route(
            "/cart",
            get(cart::show)
                .post(cart::add)
                .patch(cart::update)
                .delete(cart::clear),
        )
        .route("/cart/{product_id}", delete(cart::remove))
        .route("/orders", get(orders::index).post(orders::create))
        .route("/orders/{id}", get(orders::show))
        .route("/verify-payment", post(orders::verify_payment))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(products::admin_index).post(products::create),
        )
        .route(
            "/products/{id}",
            patch(products::update).delete(products::delete),
        )
        .route("/upload", post(products::upload))
        .route("/users", get(users::index).post(users::create))
        .route("/users/{id}", patch(users::update).delete(users::delete))
        .route("/test-email", post(users::test_email))
        .route("/orders", get(orders::admin_index))
        .route(
            "/orders/{id}",
            patch(orders::admin_update).delete(orders::admin_delete),
        )
        .route("/gallery", get(gallery::admin_index).post(gallery::create))
        .route("/gallery/{id}", delete(gallery::delete))
}

/// Create the delivery information routes router.
pub fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route("/save", post(delivery::save))
        .route("/get", get(delivery::get))
        .route("/admin/all", get(delivery::admin_all))
        .route("/admin/user/{user_id}", get(delivery::admin_for_user))
}

/// Create the support chat routes router.
pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/conversation", get(messages::conversation))
        .route("/send", post(messages::send))
        .route("/unread-count", get(messages::unread_count))
        .route("/mark-read", patch(messages::mark_read))
        .route("/admin/reply", post(messages::admin_reply))
        .route("/admin/conversations", get(messages::admin_conversations))
        .route("/admin/close", patch(messages::admin_close))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::index))
        .route("/add", post(wishlist::add))
        .route("/remove/{product_id}", delete(wishlist::remove))
        .route("/clear", delete(wishlist::clear))
        .route("/check/{product_id}", get(wishlist::check))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/auth", auth_routes())
        .nest("/api/public", public_routes())
        .nest("/api/admin", admin_routes())
        .nest("/api/delivery", delivery_routes())
        .nest("/api/messages", message_routes())
        .nest("/api/wishlist", wishlist_routes())
}

/// Service banner listing the endpoint groups.
async fn welcome() -> Json<Value> {
    Json(welcome_body())
}

fn welcome_body() -> Value {
    json!({
        "status": "success",
        "message": "Welcome to the Oxytoxin API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth",
            "public": "/api/public",
            "admin": "/api/admin",
            "delivery": "/api/delivery",
            "messages": "/api/messages",
            "wishlist": "/api/wishlist",
            "health": "/health"
        }
    })
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_lists_groups() {
        let body = welcome_body();
        assert_eq!(body["status"], "success");
        for group in ["auth", "public", "admin", "delivery", "messages", "wishlist"] {
            assert_eq!(body["endpoints"][group], format!("/api/{group}"));
        }
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health().await, "ok");
    }
}
