//! Authentication extractors.
//!
//! Every authenticated request goes through [`authenticate`]: the session
//! must name a user, the user must still exist, and the session must not have
//! timed out for inactivity. Meaningful requests then refresh the user's
//! `last_activity`.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};
use chrono::Utc;
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, User, session_keys};
use crate::services::activity;
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> Result<ApiResponse<User>> {
///     Ok(ApiResponse::ok(user))
/// }
/// ```
pub struct RequireUser(pub User);

/// Extractor that requires a logged-in admin.
///
/// Non-admins are rejected with 403.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.is_admin {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin denied");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<User, AppError> {
    // Get the session from extensions (set by SessionManagerLayer)
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AppError::AuthRequired)?;

    let current: CurrentUser = session
        .get(session_keys::CURRENT_USER)
        .await?
        .ok_or(AppError::AuthRequired)?;

    let users = UserRepository::new(state.pool());
    let Some(user) = users.get_by_id(current.id).await? else {
        tracing::warn!(user_id = %current.id, "Session user no longer exists");
        session.flush().await?;
        return Err(AppError::UserNotFound);
    };

    let now = Utc::now();
    let activity_config = state.config().activity;
    if activity::is_expired(user.activity_anchor(), now, activity_config.timeout_minutes) {
        tracing::info!(user_id = %user.id, "Session expired due to inactivity");
        session.flush().await?;
        return Err(AppError::SessionExpired);
    }

    // Nested routers strip their prefix from `parts.uri`
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map_or_else(|| parts.uri.path(), |uri| uri.0.path());
    if activity::is_meaningful(&parts.method, path) {
        users.touch_activity(user.id, now).await?;
        if activity_config.log_activity {
            tracing::info!(
                user_id = %user.id,
                method = %parts.method,
                path = %path,
                "Activity refreshed"
            );
        }
    }

    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(user)
}

/// Helper to store the logged-in user in the session.
///
/// The session ID is rotated first so a pre-login cookie cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &User,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        is_admin: user.is_admin,
    };
    session.insert(session_keys::CURRENT_USER, &current).await
}

/// Helper to end the session (logout).
///
/// # Errors
///
/// Returns an error if the session store cannot be updated.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
