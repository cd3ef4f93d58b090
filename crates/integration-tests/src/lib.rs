//! Integration tests for the Oxytoxin store API.
//!
//! The tests talk to a running server over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! oxy-cli migrate
//! cargo run -p oxytoxin-api &
//! cargo test -p oxytoxin-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `API_TEST_URL` - Server under test (default: <http://localhost:4000>)
//! - `TEST_USER_EMAIL` / `TEST_USER_PASSWORD` - A verified customer account
//! - `TEST_ADMIN_EMAIL` / `TEST_ADMIN_PASSWORD` - A verified admin account
//! - `API_TEST_DATABASE_URL` - Migrated database for the repository and
//!   extractor tests, which run in-process instead of over HTTP
//!
//! Tests that need an account or a database skip themselves when its
//! variables are unset.

use std::sync::Arc;

use axum::http::{Method, Request, request::Parts};
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower_sessions::{MemoryStore, Session};
use uuid::Uuid;

use oxytoxin_api::config::{ActivityConfig, ApiConfig};
use oxytoxin_api::db::UserRepository;
use oxytoxin_api::db::users::NewUser;
use oxytoxin_api::models::{CurrentUser, User, session_keys};
use oxytoxin_api::state::AppState;
use oxytoxin_core::Email;

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn api_base_url() -> String {
    std::env::var("API_TEST_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

/// Build a URL under the API.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", api_base_url().trim_end_matches('/'))
}

/// A client that keeps the session cookie between requests.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Credentials from a pair of environment variables, if both are set.
#[must_use]
pub fn credentials(email_var: &str, password_var: &str) -> Option<(String, String)> {
    let email = std::env::var(email_var).ok()?;
    let password = std::env::var(password_var).ok()?;
    Some((email, password))
}

/// Log in and return a client holding the session.
///
/// # Panics
///
/// Panics if the request fails or login is rejected.
pub async fn login(email: &str, password: &str) -> Client {
    let client = client();
    let resp = client
        .post(url("/api/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(resp.status(), StatusCode::OK, "login failed for {email}");
    client
}

/// Log in as the test customer, if configured.
pub async fn customer_client() -> Option<Client> {
    let (email, password) = credentials("TEST_USER_EMAIL", "TEST_USER_PASSWORD")?;
    Some(login(&email, &password).await)
}

/// Log in as the test admin, if configured.
pub async fn admin_client() -> Option<Client> {
    let (email, password) = credentials("TEST_ADMIN_EMAIL", "TEST_ADMIN_PASSWORD")?;
    Some(login(&email, &password).await)
}

/// Read a response as JSON.
///
/// # Panics
///
/// Panics if the body is not JSON.
pub async fn json_body(resp: reqwest::Response) -> Value {
    resp.json().await.expect("Response was not JSON")
}

// ============================================================================
// In-process helpers
// ============================================================================

/// Connect to the test database, if `API_TEST_DATABASE_URL` is set.
///
/// # Panics
///
/// Panics if the database cannot be reached.
pub async fn test_pool() -> Option<PgPool> {
    let database_url = std::env::var("API_TEST_DATABASE_URL").ok()?;
    Some(
        PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test database"),
    )
}

/// Application state over `pool` with email and uploads disabled and the
/// default 20 minute inactivity timeout.
///
/// # Panics
///
/// Panics if the state cannot be built.
#[must_use]
pub fn test_state(pool: PgPool) -> AppState {
    let config = ApiConfig {
        database_url: SecretString::from("postgres://localhost/oxytoxin_test"),
        host: "127.0.0.1".parse().expect("valid address"),
        port: 4000,
        base_url: "http://localhost:4000".to_string(),
        frontend_url: None,
        cors_allowed_origins: Vec::new(),
        session_secret: SecretString::from("k7#Pq9!vX2@mR4$wL8^nT3&bY6*cF1%z"),
        activity: ActivityConfig::default(),
        admin_secret: None,
        email: None,
        media: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    };
    AppState::new(config, pool).expect("Failed to build app state")
}

/// A fresh address that cannot collide with other test runs.
///
/// # Panics
///
/// Panics if the generated address is rejected.
#[must_use]
pub fn unique_email() -> Email {
    Email::parse(&format!("integration-{}@example.com", Uuid::new_v4()))
        .expect("generated email is valid")
}

/// Insert a verified account directly.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn insert_user(pool: &PgPool, is_admin: bool) -> User {
    UserRepository::new(pool)
        .create(&NewUser {
            name: "Integration Test".to_string(),
            email: unique_email(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$unused$unused".to_string(),
            address: None,
            phone: None,
            profile_picture: None,
            is_admin,
            email_verified: true,
            verification: None,
        })
        .await
        .expect("Failed to insert user")
}

/// A session logged in as `user`, backed by an in-memory store.
///
/// # Panics
///
/// Panics if the session cannot be written.
pub async fn session_for(user: &User) -> Session {
    let session = Session::new(None, Arc::new(MemoryStore::default()), None);
    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        is_admin: user.is_admin,
    };
    session
        .insert(session_keys::CURRENT_USER, &current)
        .await
        .expect("Failed to write session");
    session
}

/// Request parts for `method path` carrying `session`, as the session layer
/// would leave them.
///
/// # Panics
///
/// Panics if `path` is not a valid URI.
#[must_use]
pub fn request_parts(method: Method, path: &str, session: &Session) -> Parts {
    let (mut parts, ()) = Request::builder()
        .method(method)
        .uri(path)
        .body(())
        .expect("valid request")
        .into_parts();
    parts.extensions.insert(session.clone());
    parts
}
