//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Every error response has the shape
//! `{"status":"error","message":"...","code":"..."}`.

use axum::{
    Json,
    extract::multipart::MultipartError,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::cart::CartError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::email::EmailError;
use crate::services::media::MediaError;
use crate::services::registration::{MAX_ATTEMPTS, RegistrationError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Image validation or upload failed.
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Email delivery failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// No logged-in user.
    #[error("Authentication required")]
    AuthRequired,

    /// The session's user no longer exists.
    #[error("User not found")]
    UserNotFound,

    /// The session timed out for inactivity.
    #[error("Session expired due to inactivity. Please login again.")]
    SessionExpired,

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// User lacks permission.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Conflicting state, e.g. a duplicate.
    #[error("{0}")]
    Conflict(String),

}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    message: String,
    code: &'a str,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::EmailNotVerified => StatusCode::FORBIDDEN,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::NoPendingVerification
                | AuthError::Registration(RegistrationError::NotFound) => StatusCode::NOT_FOUND,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Media(err) => match err {
                MediaError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
                MediaError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
                MediaError::Http(_) | MediaError::Api(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Email(EmailError::Disabled) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Email(_) => StatusCode::BAD_GATEWAY,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AuthRequired | Self::UserNotFound | Self::SessionExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Machine-readable code clients can branch on.
    fn code(&self) -> &'static str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Auth(AuthError::EmailNotVerified) => "EMAIL_NOT_VERIFIED",
            _ => match self.status() {
                StatusCode::NOT_FOUND => "NOT_FOUND",
                StatusCode::CONFLICT => "CONFLICT",
                StatusCode::FORBIDDEN => "FORBIDDEN",
                StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
                StatusCode::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
                StatusCode::BAD_GATEWAY => "UPSTREAM_ERROR",
                s if s.is_server_error() => "INTERNAL_ERROR",
                _ => "BAD_REQUEST",
            },
        }
    }

    /// Client-facing message. Never exposes internal details.
    fn message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg) | RepositoryError::InvalidInput(msg)) => {
                capitalize(msg)
            }
            Self::Database(_) | Self::Session(_) => "Internal server error".to_string(),
            Self::Email(EmailError::Disabled) => "Email is not configured".to_string(),
            Self::Email(_) => "Failed to send email".to_string(),
            Self::Media(MediaError::Http(_) | MediaError::Api(_)) => {
                "Image upload failed".to_string()
            }
            Self::Media(err) => capitalize(&err.to_string()),
            Self::Auth(err) => auth_message(err),
            _ => self.to_string(),
        }
    }
}

fn auth_message(err: &AuthError) -> String {
    match err {
        AuthError::InvalidCredentials | AuthError::UserNotFound => {
            "Invalid credentials".to_string()
        }
        AuthError::EmailNotVerified => "Please verify your email before logging in".to_string(),
        AuthError::IncorrectPassword => "Current password is incorrect".to_string(),
        AuthError::UserAlreadyExists => "An account with this email already exists".to_string(),
        AuthError::WeakPassword(msg) => msg.clone(),
        AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
        AuthError::MissingField(field) => format!("{} is required", capitalize(field)),
        AuthError::PasswordMismatch => "Passwords do not match".to_string(),
        AuthError::NoPendingVerification => {
            "No pending verification found for this email".to_string()
        }
        AuthError::AlreadyVerified => "Email is already verified".to_string(),
        AuthError::InvalidCode => "Invalid verification code".to_string(),
        AuthError::CodeExpired => {
            "Verification code has expired. Please request a new one".to_string()
        }
        AuthError::TooManyAttempts => format!(
            "Too many failed attempts ({MAX_ATTEMPTS}). Please request a new code"
        ),
        AuthError::Registration(reg) => match reg {
            RegistrationError::NotFound => {
                "No pending registration found for this email".to_string()
            }
            RegistrationError::Expired => {
                "Verification code has expired. Please request a new one".to_string()
            }
            RegistrationError::InvalidCode { remaining } => {
                format!("Invalid verification code. {remaining} attempt(s) remaining")
            }
            RegistrationError::TooManyAttempts => format!(
                "Too many failed attempts ({MAX_ATTEMPTS}). Please register again"
            ),
        },
        AuthError::Repository(_) | AuthError::PasswordHash => {
            "Internal server error".to_string()
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            status: "error",
            message: self.message(),
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::NotInCart => Self::NotFound("Item not found in cart".to_string()),
            other => Self::BadRequest(capitalize(&other.to_string())),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        Self::Auth(AuthError::Registration(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::Media(MediaError::TooLarge);
        }
        Self::BadRequest(err.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_of(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product not found".to_string());
        assert_eq!(err.to_string(), "Product not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(get_status(AppError::AuthRequired), StatusCode::UNAUTHORIZED);
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::EmailNotVerified)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Media(MediaError::Disabled)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("dup".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Email(EmailError::Disabled)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let body = body_of(AppError::SessionExpired).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "SESSION_EXPIRED");
        assert_eq!(
            body["message"],
            "Session expired due to inactivity. Please login again."
        );

        let body = body_of(AppError::Auth(AuthError::EmailNotVerified)).await;
        assert_eq!(body["code"], "EMAIL_NOT_VERIFIED");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = body_of(AppError::Database(RepositoryError::DataCorruption(
            "negative stock: -3".into(),
        ))).await;
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_registration_attempts_message() {
        let body = body_of(RegistrationError::InvalidCode { remaining: 2 }.into()).await;
        assert_eq!(
            body["message"],
            "Invalid verification code. 2 attempt(s) remaining"
        );
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_oversized_quantity_is_bad_request() {
        let body = body_of(AppError::Database(RepositoryError::InvalidInput(
            "stock is too large: 4294967295".into(),
        )))
        .await;
        assert_eq!(body["code"], "BAD_REQUEST");
        assert_eq!(body["message"], "Stock is too large: 4294967295");
    }

    #[tokio::test]
    async fn test_stored_code_attempt_limit_message() {
        let body = body_of(AppError::Auth(AuthError::TooManyAttempts)).await;
        assert_eq!(
            body["message"],
            "Too many failed attempts (5). Please request a new code"
        );
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[test]
    fn test_cart_errors() {
        assert_eq!(
            get_status(CartError::NotInCart.into()),
            StatusCode::NOT_FOUND
        );
        let err: AppError = CartError::OutOfStock("Cap".into()).into();
        assert_eq!(err.to_string(), "Cap is out of stock");
    }
}
