//! Integration tests for registration, login and session handling.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (oxy-cli migrate)
//! - The API server running (cargo run -p oxytoxin-api)
//!
//! Run with: cargo test -p oxytoxin-integration-tests -- --ignored --test-threads=1

use oxytoxin_integration_tests::{client, credentials, json_body, login, url};
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_register_returns_pending_verification() {
    let client = client();
    let email = format!("integration-{}@example.com", Uuid::new_v4());

    let resp = client
        .post(url("/api/auth/register"))
        .json(&json!({
            "name": "Integration Test",
            "email": email,
            "password": "Venom-Tee-2026!",
            "confirmPassword": "Venom-Tee-2026!"
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["email"], email);
    assert!(body["data"]["expiresAt"].is_string());
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_register_rejects_mismatched_passwords() {
    let resp = client()
        .post(url("/api/auth/register"))
        .json(&json!({
            "name": "Integration Test",
            "email": format!("integration-{}@example.com", Uuid::new_v4()),
            "password": "Venom-Tee-2026!",
            "confirmPassword": "something else"
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Passwords do not match");
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_verify_without_pending_registration() {
    let resp = client()
        .post(url("/api/auth/verify-email"))
        .json(&json!({
            "email": format!("nobody-{}@example.com", Uuid::new_v4()),
            "code": "123456"
        }))
        .send()
        .await
        .expect("Failed to verify");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Login & Session
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_login_with_wrong_password() {
    let resp = client()
        .post(url("/api/auth/login"))
        .json(&json!({
            "email": format!("nobody-{}@example.com", Uuid::new_v4()),
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send login");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(resp).await;
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_me_requires_session() {
    let resp = client()
        .get(url("/api/auth/me"))
        .send()
        .await
        .expect("Failed to get /me");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "AUTH_REQUIRED");
}

#[tokio::test]
#[ignore = "Requires running API server and TEST_USER_* credentials"]
async fn test_login_me_logout() {
    let Some((email, password)) = credentials("TEST_USER_EMAIL", "TEST_USER_PASSWORD") else {
        return;
    };
    let client = login(&email, &password).await;

    let resp = client
        .get(url("/api/auth/me"))
        .send()
        .await
        .expect("Failed to get /me");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["data"]["email"], email.to_lowercase());
    assert!(body["data"].get("password").is_none());

    let resp = client
        .post(url("/api/auth/logout"))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(url("/api/auth/me"))
        .send()
        .await
        .expect("Failed to get /me");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_forgot_password_does_not_reveal_accounts() {
    let resp = client()
        .post(url("/api/auth/forgot-password"))
        .json(&json!({ "email": format!("nobody-{}@example.com", Uuid::new_v4()) }))
        .send()
        .await
        .expect("Failed to request reset");

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_activity_config_is_public() {
    let resp = client()
        .get(url("/api/auth/activity-config"))
        .send()
        .await
        .expect("Failed to get activity config");

    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert!(body["data"]["timeoutMinutes"].as_u64().unwrap_or(0) > 0);
    assert_eq!(body["data"]["presets"]["DAY"], 1440);
}

// ============================================================================
// Rate limiting
// ============================================================================

/// A client address no other test uses, so limiter buckets do not mix.
fn fresh_client_ip() -> String {
    std::net::Ipv6Addr::from(Uuid::new_v4().as_u128()).to_string()
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_session_reads_are_not_rate_limited() {
    let client = client();
    let ip = fresh_client_ip();

    for path in ["/api/auth/me", "/api/auth/activity-config"] {
        for _ in 0..10 {
            let resp = client
                .get(url(path))
                .header("x-forwarded-for", &ip)
                .send()
                .await
                .expect("Failed to send request");
            assert_ne!(resp.status(), StatusCode::TOO_MANY_REQUESTS, "{path}");
        }
    }
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_login_is_rate_limited() {
    let client = client();
    let ip = fresh_client_ip();

    let mut limited = false;
    for _ in 0..10 {
        let resp = client
            .post(url("/api/auth/login"))
            .header("x-forwarded-for", &ip)
            .json(&json!({ "email": "nobody@example.com", "password": "wrong-password" }))
            .send()
            .await
            .expect("Failed to send login request");
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            limited = true;
            break;
        }
    }
    assert!(limited, "ten quick logins from one address should be throttled");
}
