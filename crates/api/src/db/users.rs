//! User repository for database operations.
//!
//! Covers accounts, credentials, verification and reset codes, activity
//! timestamps, and the JSONB cart.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use sqlx::types::Json;

use oxytoxin_core::{Email, UserId, VerificationCode};

use super::RepositoryError;
use crate::models::cart::CartItem;
use crate::models::user::{StoredCode, User};

/// Columns selected for every [`User`] query.
const USER_COLUMNS: &str = "id, name, email, address, phone, profile_picture, is_admin, \
     email_verified, last_login, login_history, last_activity, password_changed_at, cart, \
     created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    address: Option<String>,
    phone: Option<String>,
    profile_picture: Option<String>,
    is_admin: bool,
    email_verified: bool,
    last_login: Option<DateTime<Utc>>,
    login_history: Vec<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    password_changed_at: Option<DateTime<Utc>>,
    cart: Json<Vec<CartItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            address: row.address,
            phone: row.phone,
            profile_picture: row.profile_picture,
            is_admin: row.is_admin,
            email_verified: row.email_verified,
            last_login: row.last_login,
            login_history: row.login_history,
            last_activity: row.last_activity,
            password_changed_at: row.password_changed_at,
            cart: row.cart.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CodeRow {
    code: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl CodeRow {
    fn into_stored(self) -> Result<Option<StoredCode>, RepositoryError> {
        match (self.code, self.expires_at) {
            (Some(code), Some(expires_at)) => {
                let code = VerificationCode::parse(&code).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid code in database: {e}"))
                })?;
                Ok(Some(StoredCode { code, expires_at }))
            }
            _ => Ok(None),
        }
    }
}

// =============================================================================
// Parameter Types
// =============================================================================

/// Parameters for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub is_admin: bool,
    pub email_verified: bool,
    /// Code the user must enter before first login, if unverified.
    pub verification: Option<StoredCode>,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Fields an admin may change on any account.
#[derive(Debug, Clone, Default)]
pub struct AdminUserUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub address: Option<String>,
    pub profile_picture: Option<String>,
}

/// Which emailed code a guess was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Verification,
    Reset,
}

impl CodeKind {
    /// Code, expiry, and miss-counter columns.
    const fn columns(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Verification => (
                "verification_code",
                "verification_code_expires_at",
                "verification_attempts",
            ),
            Self::Reset => ("reset_code", "reset_code_expires_at", "reset_attempts"),
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Whether an account with this email exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Get a user together with their password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let Some(user) = self.get_by_email(email).await? else {
            return Ok(None);
        };
        let hash = self.password_hash_for(user.id).await?;
        Ok(hash.map(|h| (user, h)))
    }

    /// Get the password hash for a user ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn password_hash_for(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(hash)
    }

    /// List every user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// Insert a user. `last_activity` starts at now so a session opened on
    /// the new account has a fresh anchor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let (code, expires_at) = user
            .verification
            .as_ref()
            .map_or((None, None), |v| (Some(v.code.as_str()), Some(v.expires_at)));

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (
                name, email, password_hash, address, phone, profile_picture,
                is_admin, email_verified, verification_code, verification_code_expires_at,
                last_activity
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.address)
        .bind(&user.phone)
        .bind(&user.profile_picture)
        .bind(user.is_admin)
        .bind(user.email_verified)
        .bind(code)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "Email already in use"))?;

        row.try_into()
    }

    /// Update the caller's own profile fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                phone = COALESCE($4, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.address)
        .bind(&update.phone)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sync_contact_copies(&mut tx, &row).await?;
        tx.commit().await?;
        row.try_into()
    }

    /// Update an account on behalf of an admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the new email is taken.
    pub async fn admin_update(
        &self,
        id: UserId,
        update: &AdminUserUpdate,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                address = COALESCE($4, address),
                profile_picture = COALESCE($5, profile_picture),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.address)
        .bind(&update.profile_picture)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "Email already in use"))?
        .ok_or(RepositoryError::NotFound)?;

        sync_contact_copies(&mut tx, &row).await?;
        tx.commit().await?;
        row.try_into()
    }

    /// Delete a user.
    ///
    /// Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the profile picture URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_profile_picture(&self, id: UserId, url: &str) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users SET profile_picture = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Replace the password hash and stamp `password_changed_at`.
    ///
    /// Also clears any outstanding reset code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET password_hash = $2,
                password_changed_at = NOW(),
                reset_code = NULL,
                reset_code_expires_at = NULL,
                reset_attempts = 0,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record a successful login: `last_login`, `login_history`, and
    /// `last_activity` all move to now.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn record_login(&self, id: UserId) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET last_login = NOW(),
                login_history = array_append(login_history, NOW()),
                last_activity = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Move `last_activity` forward.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn touch_activity(
        &self,
        id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET last_activity = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Verification and reset codes
    // =========================================================================

    /// Get the email verification code held for an unverified account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn verification_code(&self, id: UserId) -> Result<Option<StoredCode>, RepositoryError> {
        let row = sqlx::query_as::<_, CodeRow>(
            r"
            SELECT verification_code AS code, verification_code_expires_at AS expires_at
            FROM users WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map_or(Ok(None), CodeRow::into_stored)
    }

    /// Store a new email verification code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_verification_code(
        &self,
        id: UserId,
        code: &StoredCode,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE users
            SET verification_code = $2,
                verification_code_expires_at = $3,
                verification_attempts = 0,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(code.code.as_str())
        .bind(code.expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Mark the email verified and clear the verification code.
    ///
    /// Verification opens a session, so `last_activity` moves to now.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn mark_verified(&self, id: UserId) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET email_verified = TRUE,
                verification_code = NULL,
                verification_code_expires_at = NULL,
                verification_attempts = 0,
                last_activity = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Get the outstanding password-reset code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reset_code(&self, id: UserId) -> Result<Option<StoredCode>, RepositoryError> {
        let row = sqlx::query_as::<_, CodeRow>(
            "SELECT reset_code AS code, reset_code_expires_at AS expires_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map_or(Ok(None), CodeRow::into_stored)
    }

    /// Store a password-reset code, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_reset_code(&self, id: UserId, code: &StoredCode) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE users
            SET reset_code = $2,
                reset_code_expires_at = $3,
                reset_attempts = 0,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(code.code.as_str())
        .bind(code.expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Count a wrong guess at an emailed code. Once `max_attempts` misses
    /// have been recorded the code is cleared and must be reissued.
    ///
    /// Returns the miss count after this guess.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn record_code_miss(
        &self,
        id: UserId,
        kind: CodeKind,
        max_attempts: u32,
    ) -> Result<u32, RepositoryError> {
        let (code, expires_at, attempts) = kind.columns();
        let misses = sqlx::query_scalar::<_, i32>(&format!(
            r"
            UPDATE users
            SET {attempts} = {attempts} + 1,
                {code} = CASE WHEN {attempts} + 1 >= $2 THEN NULL ELSE {code} END,
                {expires_at} = CASE WHEN {attempts} + 1 >= $2 THEN NULL ELSE {expires_at} END
            WHERE id = $1
            RETURNING {attempts}
            "
        ))
        .bind(id)
        .bind(i64::from(max_attempts))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        u32::try_from(misses).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative attempt count: {misses}"))
        })
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Replace the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn save_cart(&self, id: UserId, items: &[CartItem]) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET cart = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(Json(items))
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Admin flag
    // =========================================================================

    /// Grant or revoke admin rights by email.
    ///
    /// Returns whether an account matched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_admin(&self, email: &Email, is_admin: bool) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET is_admin = $2, updated_at = NOW() WHERE email = $1")
                .bind(email)
                .bind(is_admin)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Carry the account's current email and name onto the support conversation
/// and saved delivery address. Orders keep the email they were placed with.
async fn sync_contact_copies(
    conn: &mut PgConnection,
    row: &UserRow,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE conversations
        SET user_email = $2, user_name = $3, updated_at = NOW()
        WHERE user_id = $1 AND (user_email <> $2 OR user_name <> $3)
        ",
    )
    .bind(row.id)
    .bind(&row.email)
    .bind(&row.name)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        UPDATE delivery_info
        SET user_email = $2, updated_at = NOW()
        WHERE user_id = $1 AND user_email <> $2
        ",
    )
    .bind(row.id)
    .bind(&row.email)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
