//! Integration tests for account codes and account edits, run in-process
//! against a real database.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (oxy-cli migrate)
//! - `API_TEST_DATABASE_URL` pointing at it
//!
//! Run with: cargo test -p oxytoxin-integration-tests -- --ignored --test-threads=1

use axum::extract::FromRequestParts;
use axum::http::Method;
use chrono::Utc;

use oxytoxin_api::db::users::AdminUserUpdate;
use oxytoxin_api::db::{ConversationRepository, DeliveryRepository, UserRepository};
use oxytoxin_api::middleware::RequireUser;
use oxytoxin_api::models::DeliveryInput;
use oxytoxin_api::services::activity;
use oxytoxin_api::services::auth::{AuthError, AuthService, NewAccount};
use oxytoxin_api::services::registration::MAX_ATTEMPTS;
use oxytoxin_core::VerificationCode;
use oxytoxin_integration_tests::{
    insert_user, request_parts, session_for, test_pool, test_state, unique_email,
};

fn wrong_code(code: &VerificationCode) -> &'static str {
    if code.as_str() == "123456" {
        "654321"
    } else {
        "123456"
    }
}

fn account(email: &str) -> NewAccount {
    NewAccount {
        name: "Admin Made".to_string(),
        email: email.to_string(),
        password: "Venom-Tee-2026!".to_string(),
        ..NewAccount::default()
    }
}

// ============================================================================
// Verification of admin-created accounts
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_verified_account_starts_with_fresh_activity() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let auth = AuthService::new(&pool, state.registrations());

    let email = unique_email();
    let (created, issued) = auth
        .create_user(account(email.as_str()))
        .await
        .expect("Failed to create user");

    // Created an hour ago, verified after a resend
    sqlx::query(
        "UPDATE users SET created_at = NOW() - INTERVAL '1 hour', last_activity = NULL \
         WHERE id = $1",
    )
    .bind(created.id)
    .execute(&pool)
    .await
    .expect("Failed to backdate user");
    let reissued = auth
        .resend_code(email.as_str())
        .await
        .expect("Failed to resend code");
    assert_eq!(reissued.email, issued.email);

    let verified = auth
        .verify_email(email.as_str(), reissued.code.as_str())
        .await
        .expect("Failed to verify");
    assert!(verified.email_verified);
    assert!(!activity::is_expired(
        verified.activity_anchor(),
        Utc::now(),
        20
    ));

    let session = session_for(&verified).await;
    let mut parts = request_parts(Method::GET, "/api/auth/me", &session);
    assert!(
        RequireUser::from_request_parts(&mut parts, &state)
            .await
            .is_ok()
    );
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_stored_verification_code_locks_after_attempt_limit() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let auth = AuthService::new(&pool, state.registrations());

    let email = unique_email();
    let (_, issued) = auth
        .create_user(account(email.as_str()))
        .await
        .expect("Failed to create user");
    let wrong = wrong_code(&issued.code);

    for _ in 1..MAX_ATTEMPTS {
        assert!(matches!(
            auth.verify_email(email.as_str(), wrong).await,
            Err(AuthError::InvalidCode)
        ));
    }
    assert!(matches!(
        auth.verify_email(email.as_str(), wrong).await,
        Err(AuthError::TooManyAttempts)
    ));

    // The right code no longer works; a new one has to be requested
    assert!(
        auth.verify_email(email.as_str(), issued.code.as_str())
            .await
            .is_err()
    );
    let reissued = auth
        .resend_code(email.as_str())
        .await
        .expect("Failed to resend code");
    assert!(
        auth.verify_email(email.as_str(), reissued.code.as_str())
            .await
            .is_ok()
    );
}

// ============================================================================
// Password reset
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_reset_code_locks_after_attempt_limit() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let state = test_state(pool.clone());
    let auth = AuthService::new(&pool, state.registrations());
    let user = insert_user(&pool, false).await;
    let email = user.email.as_str();

    let issued = auth
        .request_password_reset(email)
        .await
        .expect("Failed to request reset")
        .expect("account exists");
    let wrong = wrong_code(&issued.code);

    for _ in 1..MAX_ATTEMPTS {
        assert!(matches!(
            auth.reset_password(email, wrong, "New-Venom-2026!", None).await,
            Err(AuthError::InvalidCode)
        ));
    }
    assert!(matches!(
        auth.reset_password(email, wrong, "New-Venom-2026!", None).await,
        Err(AuthError::TooManyAttempts)
    ));
    assert!(matches!(
        auth.reset_password(email, issued.code.as_str(), "New-Venom-2026!", None)
            .await,
        Err(AuthError::InvalidCode)
    ));

    // A fresh code starts a fresh count
    let reissued = auth
        .request_password_reset(email)
        .await
        .expect("Failed to request reset")
        .expect("account exists");
    assert!(
        auth.reset_password(email, reissued.code.as_str(), "New-Venom-2026!", None)
            .await
            .is_ok()
    );
}

// ============================================================================
// Admin edits
// ============================================================================

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_admin_email_change_follows_to_chat_and_delivery() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = insert_user(&pool, false).await;

    let conversations = ConversationRepository::new(&pool);
    conversations
        .get_or_create(user.id, &user.email, &user.name)
        .await
        .expect("Failed to open conversation");
    DeliveryRepository::new(&pool)
        .save(
            user.id,
            &user.email,
            &DeliveryInput {
                full_name: "Integration Test".to_string(),
                phone_number: "08030000000".to_string(),
                address: "1 Venom Way".to_string(),
                city: "Lagos".to_string(),
                state: "Lagos".to_string(),
                postal_code: None,
                landmark: None,
            },
        )
        .await
        .expect("Failed to save delivery info");

    let new_email = unique_email();
    let updated = UserRepository::new(&pool)
        .admin_update(
            user.id,
            &AdminUserUpdate {
                email: Some(new_email.clone()),
                ..AdminUserUpdate::default()
            },
        )
        .await
        .expect("Failed to update user");
    assert_eq!(updated.email, new_email);

    let found = conversations
        .find_by_email(&new_email)
        .await
        .expect("Failed to look up conversation")
        .expect("conversation found by new email");
    assert_eq!(found.user_id, user.id);
    assert_eq!(found.user_email, new_email);
    assert!(
        conversations
            .find_by_email(&user.email)
            .await
            .expect("Failed to look up conversation")
            .is_none()
    );

    let delivery = DeliveryRepository::new(&pool)
        .get_for_user(user.id)
        .await
        .expect("Failed to load delivery info")
        .expect("delivery info saved");
    assert_eq!(delivery.user_email, new_email);
}
