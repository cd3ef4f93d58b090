//! Account administration.

use axum::extract::State;
use serde::Deserialize;

use oxytoxin_core::{Email, UserId};

use crate::db::users::AdminUserUpdate;
use crate::db::{RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::response::{ApiJson, ApiPath, ApiResponse};
use crate::services::AuthService;
use crate::services::auth::NewAccount;
use crate::state::AppState;

/// Fields an admin may change. Blank values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(alias = "profilePicture")]
    pub avatar: Option<String>,
}

impl UpdateUser {
    fn into_update(self) -> Result<AdminUserUpdate> {
        let email = non_blank(self.email)
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(|_| AppError::BadRequest("Invalid email address".to_string()))?;
        Ok(AdminUserUpdate {
            name: non_blank(self.name),
            email,
            address: non_blank(self.address),
            profile_picture: non_blank(self.avatar),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct TestEmail {
    pub email: Option<String>,
}

fn not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

/// GET /api/admin/users
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<ApiResponse<Vec<User>>> {
    let users = UserRepository::new(state.pool()).list().await?;
    Ok(ApiResponse::ok(users))
}

/// Create an unverified account and email it a verification code.
///
/// POST /api/admin/users
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(account): ApiJson<NewAccount>,
) -> Result<ApiResponse<User>> {
    let (user, issued) = AuthService::new(state.pool(), state.registrations())
        .create_user(account)
        .await?;

    // The user can ask for a new code, so a failed send is not fatal
    if let Err(e) = state
        .email()
        .send_verification_code(&issued.email, &issued.name, &issued.code)
        .await
    {
        tracing::error!(error = %e, user_id = %user.id, "Failed to send verification code");
    }

    tracing::info!(user_id = %user.id, admin_id = %admin.id, "User created by admin");
    Ok(ApiResponse::created(user)
        .with_message("User created. A verification code has been sent to their email."))
}

/// PATCH /api/admin/users/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(form): ApiJson<UpdateUser>,
) -> Result<ApiResponse<User>> {
    let update = form.into_update()?;
    let user = UserRepository::new(state.pool())
        .admin_update(id, &update)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => not_found(),
            other => other.into(),
        })?;

    tracing::info!(user_id = %id, admin_id = %admin.id, "User updated by admin");
    Ok(ApiResponse::ok(user).with_message("User updated successfully"))
}

/// DELETE /api/admin/users/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
) -> Result<ApiResponse<()>> {
    if !UserRepository::new(state.pool()).delete(id).await? {
        return Err(not_found());
    }
    tracing::info!(user_id = %id, admin_id = %admin.id, "User deleted by admin");
    Ok(ApiResponse::message("User deleted"))
}

/// Send a test message, to the given address or the caller's own.
///
/// POST /api/admin/test-email
pub async fn test_email(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(form): ApiJson<TestEmail>,
) -> Result<ApiResponse<()>> {
    let to = match non_blank(form.email) {
        Some(email) => Email::parse(&email)
            .map_err(|_| AppError::BadRequest("Invalid email address".to_string()))?,
        None => admin.email,
    };

    state.email().send_test_email(&to).await?;
    Ok(ApiResponse::message(format!("Test email sent to {to}")))
}
