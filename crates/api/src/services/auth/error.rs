//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::registration::RegistrationError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] oxytoxin_core::EmailError),

    /// A required field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but its email has not been verified.
    #[error("email not verified")]
    EmailNotVerified,

    /// The current password given for a password change is wrong.
    #[error("current password is incorrect")]
    IncorrectPassword,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Nothing is awaiting verification for this email.
    #[error("no pending verification for this email")]
    NoPendingVerification,

    /// The email is already verified.
    #[error("email already verified")]
    AlreadyVerified,

    /// The code is wrong or none was issued.
    #[error("invalid code")]
    InvalidCode,

    /// The code has expired.
    #[error("code expired")]
    CodeExpired,

    /// Too many wrong guesses; the code was discarded.
    #[error("too many failed attempts")]
    TooManyAttempts,

    /// Pending registration check failed.
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
