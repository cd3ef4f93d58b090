//! Authentication service.
//!
//! Password login plus the email verification and password reset flows.
//! Self-service registrations are staged in [`RegistrationStore`] until the
//! emailed code is confirmed; accounts created by an admin are persisted
//! straight away and carry their verification code in the database.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use sqlx::PgPool;

use oxytoxin_core::{Email, UserId, VerificationCode};

use crate::db::RepositoryError;
use crate::db::users::{CodeKind, NewUser, UserRepository};
use crate::models::user::{StoredCode, User};
use crate::services::registration::{
    CODE_TTL_MINUTES, MAX_ATTEMPTS, RegistrationDetails, RegistrationError, RegistrationStore,
};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Account fields shared by self-registration and admin-created users.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub confirm_password: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "avatar")]
    pub profile_picture: Option<String>,
}

/// A code that was just issued and needs to be emailed.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub name: String,
    pub email: Email,
    pub code: VerificationCode,
    pub expires_at: DateTime<Utc>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    registrations: &'a RegistrationStore,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, registrations: &'a RegistrationStore) -> Self {
        Self {
            users: UserRepository::new(pool),
            registrations,
        }
    }

    // =========================================================================
    // Registration and verification
    // =========================================================================

    /// Validate a registration and stage it until the email is verified.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input and
    /// `AuthError::UserAlreadyExists` if the email belongs to an account.
    pub async fn register(
        &self,
        account: NewAccount,
        is_admin: bool,
    ) -> Result<IssuedCode, AuthError> {
        let (name, email) = validate_account(&account)?;

        if self.users.email_exists(&email).await? {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(&account.password)?;
        let code = generate_code();
        let details = RegistrationDetails {
            name: name.clone(),
            email: email.clone(),
            password_hash,
            address: trimmed(account.address),
            phone: trimmed(account.phone),
            is_admin,
        };
        let expires_at = self
            .registrations
            .stage(details, code.clone(), Utc::now())
            .await;

        Ok(IssuedCode {
            name,
            email,
            code,
            expires_at,
        })
    }

    /// Confirm an email with its code.
    ///
    /// A pending registration is persisted as a verified account. Otherwise an
    /// unverified account created by an admin is checked against its stored
    /// code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Registration` for pending-registration failures,
    /// `InvalidCode`/`CodeExpired`/`TooManyAttempts` for stored codes, and
    /// `NoPendingVerification` when nothing is awaiting verification.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;

        let details = match self.registrations.verify(&email, code, Utc::now()).await {
            Ok(details) => details,
            Err(RegistrationError::NotFound) => {
                return self.verify_stored_email(&email, code).await;
            }
            Err(other) => return Err(other.into()),
        };

        self.users
            .create(&NewUser {
                name: details.name,
                email: details.email,
                password_hash: details.password_hash,
                address: details.address,
                phone: details.phone,
                profile_picture: None,
                is_admin: details.is_admin,
                email_verified: true,
                verification: None,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Verify an admin-created account against the code stored on its row.
    async fn verify_stored_email(&self, email: &Email, code: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or(AuthError::NoPendingVerification)?;
        if user.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let stored = self
            .users
            .verification_code(user.id)
            .await?
            .ok_or(AuthError::NoPendingVerification)?;
        self.check_code(user.id, CodeKind::Verification, &stored, code).await?;

        Ok(self.users.mark_verified(user.id).await?)
    }

    /// Issue a new verification code, for a pending registration or an
    /// unverified persisted account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AlreadyVerified` for verified accounts and
    /// `NoPendingVerification` when the email is unknown.
    pub async fn resend_code(&self, email: &str) -> Result<IssuedCode, AuthError> {
        let email = Email::parse(email)?;
        let code = generate_code();
        let now = Utc::now();

        match self.registrations.reissue(&email, code.clone(), now).await {
            Ok((name, expires_at)) => {
                return Ok(IssuedCode {
                    name,
                    email,
                    code,
                    expires_at,
                });
            }
            Err(RegistrationError::NotFound) => {}
            Err(other) => return Err(other.into()),
        }

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::NoPendingVerification)?;
        if user.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let stored = new_stored_code(code, now);
        self.users.set_verification_code(user.id, &stored).await?;

        Ok(IssuedCode {
            name: user.name,
            email,
            code: stored.code,
            expires_at: stored.expires_at,
        })
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Login with email and password and record the login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// and `AuthError::EmailNotVerified` if the account is unverified.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        Ok(self.users.record_login(user.id).await?)
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Store a reset code for the account, if there is one.
    ///
    /// Unknown emails return `Ok(None)` so callers can respond identically
    /// whether or not the account exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database fails.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<IssuedCode>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let Some(user) = self.users.get_by_email(&email).await? else {
            return Ok(None);
        };

        let stored = new_stored_code(generate_code(), Utc::now());
        self.users.set_reset_code(user.id, &stored).await?;

        Ok(Some(IssuedCode {
            name: user.name,
            email,
            code: stored.code,
            expires_at: stored.expires_at,
        }))
    }

    /// Set a new password using an emailed reset code.
    ///
    /// # Errors
    ///
    /// Returns a password validation error, or `InvalidCode`/`CodeExpired`
    /// when the code does not check out. `TooManyAttempts` means the code was
    /// discarded and a new one must be requested.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        confirm_password: Option<&str>,
    ) -> Result<(), AuthError> {
        validate_new_password(new_password, confirm_password)?;

        let email = Email::parse(email)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCode)?;
        let stored = self
            .users
            .reset_code(user.id)
            .await?
            .ok_or(AuthError::InvalidCode)?;
        self.check_code(user.id, CodeKind::Reset, &stored, code).await?;

        let password_hash = hash_password(new_password)?;
        self.users.update_password(user.id, &password_hash).await?;
        Ok(())
    }

    /// Change the password of a logged-in user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IncorrectPassword` if `current_password` is wrong,
    /// or a validation error for the new password.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
        confirm_password: Option<&str>,
    ) -> Result<(), AuthError> {
        validate_new_password(new_password, confirm_password)?;

        let password_hash = self
            .users
            .password_hash_for(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        verify_password(current_password, &password_hash)
            .map_err(|_| AuthError::IncorrectPassword)?;

        let new_hash = hash_password(new_password)?;
        self.users.update_password(user_id, &new_hash).await?;
        Ok(())
    }

    /// Check a database-held code, counting a wrong guess against the
    /// account. The guess that reaches `MAX_ATTEMPTS` clears the code.
    async fn check_code(
        &self,
        id: UserId,
        kind: CodeKind,
        stored: &StoredCode,
        input: &str,
    ) -> Result<(), AuthError> {
        match check_stored_code(stored, input, Utc::now()) {
            Err(AuthError::InvalidCode) => {
                let misses = self.users.record_code_miss(id, kind, MAX_ATTEMPTS).await?;
                Err(miss_error(misses))
            }
            other => other,
        }
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Create an unverified account on behalf of an admin. The returned code
    /// must be emailed to the new user.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input and
    /// `AuthError::UserAlreadyExists` if the email is taken.
    pub async fn create_user(&self, account: NewAccount) -> Result<(User, IssuedCode), AuthError> {
        let (name, email) = validate_account(&account)?;
        let password_hash = hash_password(&account.password)?;
        let stored = new_stored_code(generate_code(), Utc::now());

        let user = self
            .users
            .create(&NewUser {
                name: name.clone(),
                email: email.clone(),
                password_hash,
                address: trimmed(account.address),
                phone: trimmed(account.phone),
                profile_picture: trimmed(account.profile_picture),
                is_admin: false,
                email_verified: false,
                verification: Some(stored.clone()),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        Ok((
            user,
            IssuedCode {
                name,
                email,
                code: stored.code,
                expires_at: stored.expires_at,
            },
        ))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random 6-digit code.
#[must_use]
pub fn generate_code() -> VerificationCode {
    VerificationCode::from_number(rand::rng().random_range(100_000..1_000_000))
}

fn new_stored_code(code: VerificationCode, now: DateTime<Utc>) -> StoredCode {
    StoredCode {
        code,
        expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
    }
}

fn check_stored_code(stored: &StoredCode, input: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
    if stored.is_expired(now) {
        return Err(AuthError::CodeExpired);
    }
    if !stored.code.matches(input) {
        return Err(AuthError::InvalidCode);
    }
    Ok(())
}

fn miss_error(misses: u32) -> AuthError {
    if misses >= MAX_ATTEMPTS {
        AuthError::TooManyAttempts
    } else {
        AuthError::InvalidCode
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check the name, email, and password of a new account.
fn validate_account(account: &NewAccount) -> Result<(String, Email), AuthError> {
    let name = account.name.trim();
    if name.is_empty() {
        return Err(AuthError::MissingField("name"));
    }
    if account.email.trim().is_empty() {
        return Err(AuthError::MissingField("email"));
    }
    let email = Email::parse(&account.email)?;
    validate_new_password(&account.password, account.confirm_password.as_deref())?;
    Ok((name.to_string(), email))
}

fn validate_new_password(password: &str, confirmation: Option<&str>) -> Result<(), AuthError> {
    validate_password(password)?;
    if confirmation.is_some_and(|c| c != password) {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
