//! Integration tests for the authentication extractors.
//!
//! These run `RequireUser` / `RequireAdmin` in-process against a real
//! database, with the session held in memory.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (oxy-cli migrate)
//! - `API_TEST_DATABASE_URL` pointing at it
//!
//! Run with: cargo test -p oxytoxin-integration-tests -- --ignored --test-threads=1

use axum::extract::FromRequestParts;
use axum::http::Method;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use oxytoxin_api::db::UserRepository;
use oxytoxin_api::error::AppError;
use oxytoxin_api::middleware::{RequireAdmin, RequireUser};
use oxytoxin_api::models::{CurrentUser, session_keys};
use oxytoxin_core::UserId;
use oxytoxin_integration_tests::{
    insert_user, request_parts, session_for, test_pool, test_state,
};

/// Move `last_activity` back by `minutes` and return the stored value.
async fn idle_for(pool: &PgPool, id: UserId, minutes: i32) -> DateTime<Utc> {
    sqlx::query_scalar::<_, DateTime<Utc>>(
        "UPDATE users SET last_activity = NOW() - make_interval(mins => $2) \
         WHERE id = $1 RETURNING last_activity",
    )
    .bind(id)
    .bind(minutes)
    .fetch_one(pool)
    .await
    .expect("Failed to backdate activity")
}

async fn last_activity(pool: &PgPool, id: UserId) -> Option<DateTime<Utc>> {
    UserRepository::new(pool)
        .get_by_id(id)
        .await
        .expect("Failed to load user")
        .expect("user exists")
        .last_activity
}

// ============================================================================
// Session checks
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_missing_session_user_is_auth_required() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let user = insert_user(&pool, false).await;
    let session = session_for(&user).await;
    session.flush().await.expect("Failed to flush");

    let mut parts = request_parts(Method::GET, "/api/public/profile", &session);
    let result = RequireUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::AuthRequired)));
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_idle_session_expires_and_is_flushed() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let user = insert_user(&pool, false).await;
    idle_for(&pool, user.id, 21).await;
    let session = session_for(&user).await;

    let mut parts = request_parts(Method::GET, "/api/public/profile", &session);
    let result = RequireUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::SessionExpired)));

    let remaining: Option<CurrentUser> = session
        .get(session_keys::CURRENT_USER)
        .await
        .expect("Failed to read session");
    assert!(remaining.is_none(), "expired session should be flushed");
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_session_inside_timeout_is_accepted() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let user = insert_user(&pool, false).await;
    idle_for(&pool, user.id, 19).await;
    let session = session_for(&user).await;

    let mut parts = request_parts(Method::GET, "/api/public/profile", &session);
    let result = RequireUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Ok(RequireUser(u)) if u.id == user.id));
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_deleted_user_is_user_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let user = insert_user(&pool, false).await;
    let session = session_for(&user).await;
    assert!(
        UserRepository::new(&pool)
            .delete(user.id)
            .await
            .expect("Failed to delete user")
    );

    let mut parts = request_parts(Method::GET, "/api/auth/me", &session);
    let result = RequireUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::UserNotFound)));

    let remaining: Option<CurrentUser> = session
        .get(session_keys::CURRENT_USER)
        .await
        .expect("Failed to read session");
    assert!(remaining.is_none());
}

// ============================================================================
// Activity refresh
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_cart_write_refreshes_activity() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let user = insert_user(&pool, false).await;
    let before = idle_for(&pool, user.id, 10).await;
    let session = session_for(&user).await;

    let mut parts = request_parts(Method::POST, "/api/public/cart", &session);
    assert!(
        RequireUser::from_request_parts(&mut parts, &state)
            .await
            .is_ok()
    );

    let after = last_activity(&pool, user.id).await.expect("activity set");
    assert!(after > before);
    assert!(Utc::now() - after < chrono::Duration::minutes(1));
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_unread_poll_does_not_refresh_activity() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let user = insert_user(&pool, false).await;
    let before = idle_for(&pool, user.id, 10).await;
    let session = session_for(&user).await;

    let mut parts = request_parts(Method::GET, "/api/messages/unread-count", &session);
    assert!(
        RequireUser::from_request_parts(&mut parts, &state)
            .await
            .is_ok()
    );

    assert_eq!(last_activity(&pool, user.id).await, Some(before));
}

// ============================================================================
// Admin gate
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_require_admin_rejects_customer() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let customer = insert_user(&pool, false).await;
    let session = session_for(&customer).await;

    let mut parts = request_parts(Method::GET, "/api/admin/users", &session);
    let result = RequireAdmin::from_request_parts(&mut parts, &state).await;
    assert!(matches!(
        result,
        Err(AppError::Forbidden(ref msg)) if msg == "Admin access required"
    ));
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_require_admin_accepts_admin() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let admin = insert_user(&pool, true).await;
    let session = session_for(&admin).await;

    let mut parts = request_parts(Method::GET, "/api/admin/users", &session);
    let result = RequireAdmin::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Ok(RequireAdmin(u)) if u.is_admin));
}
