//! Account routes: registration, email verification, login, passwords.

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user};
use crate::middleware::{RequireUser, clear_current_user, set_current_user};
use crate::models::User;
use crate::response::{ApiJson, ApiResponse};
use crate::services::AuthService;
use crate::services::activity::{self, TimeoutPresets};
use crate::services::auth::{IssuedCode, NewAccount};
use crate::state::AppState;

/// Registration form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub account: NewAccount,
    #[serde(default)]
    pub is_admin: bool,
    pub admin_secret: Option<String>,
}

/// Where a verification code was sent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingVerification {
    pub email: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<&IssuedCode> for PendingVerification {
    fn from(issued: &IssuedCode) -> Self {
        Self {
            email: issued.email.to_string(),
            expires_at: issued.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub new_password: String,
    pub confirm_password: Option<String>,
}

/// Inactivity settings clients use to warn before a session lapses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityConfigResponse {
    pub timeout_minutes: u32,
    pub presets: TimeoutPresets,
}

/// Stage a registration and email its verification code.
///
/// POST /api/auth/register
///
/// Admin rights are granted only when `adminSecret` matches the configured
/// secret; otherwise the account is created as a customer.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<RegisterRequest>,
) -> Result<ApiResponse<PendingVerification>> {
    let is_admin =
        form.is_admin && state.config().admin_secret_matches(form.admin_secret.as_deref());
    if form.is_admin && !is_admin {
        tracing::warn!("Admin registration attempted with an invalid secret");
    }

    let auth = AuthService::new(state.pool(), state.registrations());
    let issued = auth.register(form.account, is_admin).await?;

    state
        .email()
        .send_verification_code(&issued.email, &issued.name, &issued.code)
        .await?;

    tracing::info!(email = %issued.email, is_admin, "Registration pending verification");

    Ok(ApiResponse::ok(PendingVerification::from(&issued))
        .with_status(StatusCode::ACCEPTED)
        .with_message(
            "Registration started. Check your email for a verification code to complete signup.",
        ))
}

/// Verify an email address and log the user in.
///
/// POST /api/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<VerifyEmailRequest>,
) -> Result<ApiResponse<User>> {
    if form.email.trim().is_empty() || form.code.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Email and verification code are required".to_string(),
        ));
    }

    let auth = AuthService::new(state.pool(), state.registrations());
    let user = auth.verify_email(&form.email, &form.code).await?;

    set_current_user(&session, &user).await?;
    let user_id = user.id.to_string();
    add_breadcrumb("auth", "Email verified", Some(&[("user_id", user_id.as_str())]));
    tracing::info!(user_id = %user.id, "Email verified");

    Ok(ApiResponse::ok(user).with_message("Email verified successfully"))
}

/// Issue a fresh verification code.
///
/// POST /api/auth/resend-code
pub async fn resend_code(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<EmailRequest>,
) -> Result<ApiResponse<PendingVerification>> {
    if form.email.trim().is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }

    let auth = AuthService::new(state.pool(), state.registrations());
    let issued = auth.resend_code(&form.email).await?;

    state
        .email()
        .send_verification_code(&issued.email, &issued.name, &issued.code)
        .await?;

    Ok(ApiResponse::ok(PendingVerification::from(&issued))
        .with_message("Verification code resent. Please check your email."))
}

/// Log in with email and password.
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<LoginRequest>,
) -> Result<ApiResponse<User>> {
    if form.email.trim().is_empty() || form.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password required".to_string(),
        ));
    }

    let auth = AuthService::new(state.pool(), state.registrations());
    let user = auth.login(&form.email, &form.password).await?;

    set_current_user(&session, &user).await?;
    let user_id = user.id.to_string();
    add_breadcrumb("auth", "User logged in", Some(&[("user_id", user_id.as_str())]));
    tracing::info!(user_id = %user.id, is_admin = user.is_admin, "User logged in");

    Ok(ApiResponse::ok(user).with_message("Login successful"))
}

/// End the session.
///
/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<ApiResponse<()>> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(ApiResponse::message("Logged out"))
}

/// The logged-in user.
///
/// GET /api/auth/me
pub async fn me(RequireUser(user): RequireUser) -> ApiResponse<User> {
    ApiResponse::ok(user)
}

/// Email a password reset code.
///
/// POST /api/auth/forgot-password
///
/// Responds the same whether or not the account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<EmailRequest>,
) -> Result<ApiResponse<()>> {
    if form.email.trim().is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }

    let auth = AuthService::new(state.pool(), state.registrations());
    if let Some(issued) = auth.request_password_reset(&form.email).await?
        && let Err(e) = state
            .email()
            .send_password_reset_code(&issued.email, &issued.name, &issued.code)
            .await
    {
        tracing::error!(error = %e, email = %issued.email, "Failed to send reset code");
    }

    Ok(ApiResponse::message(
        "If an account exists for this email, a reset code has been sent.",
    ))
}

/// Set a new password with a reset code.
///
/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<ResetPasswordRequest>,
) -> Result<ApiResponse<()>> {
    if form.email.trim().is_empty() || form.code.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Email and reset code are required".to_string(),
        ));
    }

    let auth = AuthService::new(state.pool(), state.registrations());
    auth.reset_password(
        &form.email,
        &form.code,
        &form.new_password,
        form.confirm_password.as_deref(),
    )
    .await?;

    tracing::info!("Password reset completed");
    Ok(ApiResponse::message(
        "Password reset successfully. Please login with your new password.",
    ))
}

/// Inactivity timeout settings.
///
/// GET /api/auth/activity-config
pub async fn activity_config(State(state): State<AppState>) -> ApiResponse<ActivityConfigResponse> {
    ApiResponse::ok(ActivityConfigResponse {
        timeout_minutes: state.config().activity.timeout_minutes,
        presets: activity::PRESETS,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_flattens_account() {
        let form: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "Ada",
            "email": "ada@example.com",
            "password": "correct horse",
            "confirmPassword": "correct horse",
            "isAdmin": true,
            "adminSecret": "s3cret"
        }))
        .unwrap();

        assert_eq!(form.account.name, "Ada");
        assert_eq!(form.account.confirm_password.as_deref(), Some("correct horse"));
        assert!(form.is_admin);
        assert_eq!(form.admin_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_register_request_defaults_to_customer() {
        let form: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "Ada",
            "email": "ada@example.com",
            "password": "correct horse"
        }))
        .unwrap();
        assert!(!form.is_admin);
        assert!(form.admin_secret.is_none());
    }

    #[test]
    fn test_activity_config_shape() {
        let body = serde_json::to_value(ActivityConfigResponse {
            timeout_minutes: 20,
            presets: activity::PRESETS,
        })
        .unwrap();
        assert_eq!(body["timeoutMinutes"], 20);
        assert_eq!(body["presets"]["DAY"], 1440);
    }
}
