//! Admin user management commands.
//!
//! Accounts are created through the API's registration flow; these
//! commands only flip the admin flag on an existing account.
//!
//! # Usage
//!
//! ```bash
//! oxy-cli admin promote -e owner@oxytoxin.store
//! oxy-cli admin demote -e former@oxytoxin.store
//! ```

use oxytoxin_api::db::{RepositoryError, UserRepository};
use oxytoxin_core::Email;
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Repository error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with this email.
    #[error("No account found with email: {0}")]
    UserNotFound(String),
}

/// Grant (`true`) or revoke (`false`) admin rights.
///
/// # Errors
///
/// Returns an error if the email is invalid, no account matches, or the
/// database is unreachable.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = connect().await?;

    if !UserRepository::new(&pool).set_admin(&email, is_admin).await? {
        return Err(AdminError::UserNotFound(email.into_inner()));
    }

    if is_admin {
        tracing::info!(email = %email, "Account promoted to admin");
    } else {
        tracing::info!(email = %email, "Admin rights removed");
    }
    Ok(())
}
