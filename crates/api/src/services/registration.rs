//! Registrations waiting for email verification.
//!
//! Nothing is written to the database until the emailed code is confirmed.
//! Pending entries live in a `moka` cache keyed by email. Each entry carries
//! its own code expiry (10 minutes); the cache TTL is longer so an expired
//! code can still be reported as expired and reissued with `resend-code`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use moka::future::Cache;
use thiserror::Error;
use tokio::sync::Mutex;

use oxytoxin_core::{Email, VerificationCode};

/// How long an emailed code stays valid.
pub const CODE_TTL_MINUTES: i64 = 10;

/// Wrong guesses allowed before the registration is discarded.
pub const MAX_ATTEMPTS: u32 = 5;

/// How long an untouched pending registration is kept at all.
const ENTRY_TTL: StdDuration = StdDuration::from_secs(60 * 60);

const MAX_PENDING: u64 = 10_000;

/// Errors from verifying a pending registration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// No pending registration for this email.
    #[error("no pending registration for this email")]
    NotFound,

    /// The code has expired; a new one must be requested.
    #[error("verification code has expired")]
    Expired,

    /// The code is wrong.
    #[error("invalid verification code")]
    InvalidCode { remaining: u32 },

    /// Too many wrong guesses; the registration was discarded.
    #[error("too many failed attempts")]
    TooManyAttempts,
}

/// Account details captured at registration time.
#[derive(Debug, Clone)]
pub struct RegistrationDetails {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
struct PendingRegistration {
    details: RegistrationDetails,
    code: VerificationCode,
    expires_at: DateTime<Utc>,
    attempts: u32,
}

/// In-memory store of unverified registrations.
#[derive(Clone)]
pub struct RegistrationStore {
    inner: Arc<RegistrationStoreInner>,
}

struct RegistrationStoreInner {
    pending: Cache<Email, PendingRegistration>,
    // Serializes read-modify-write cycles on entries
    lock: Mutex<()>,
}

impl Default for RegistrationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationStore {
    #[must_use]
    pub fn new() -> Self {
        let pending = Cache::builder()
            .max_capacity(MAX_PENDING)
            .time_to_live(ENTRY_TTL)
            .build();

        Self {
            inner: Arc::new(RegistrationStoreInner {
                pending,
                lock: Mutex::new(()),
            }),
        }
    }

    /// Stage a registration, replacing any earlier one for the same email.
    ///
    /// Returns when the code expires.
    pub async fn stage(
        &self,
        details: RegistrationDetails,
        code: VerificationCode,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let _guard = self.inner.lock.lock().await;
        let expires_at = now + Duration::minutes(CODE_TTL_MINUTES);
        let email = details.email.clone();
        self.inner
            .pending
            .insert(
                email,
                PendingRegistration {
                    details,
                    code,
                    expires_at,
                    attempts: 0,
                },
            )
            .await;
        expires_at
    }

    /// Whether a registration is pending for `email`.
    #[must_use]
    pub fn contains(&self, email: &Email) -> bool {
        self.inner.pending.contains_key(email)
    }

    /// Check a code. On success the entry is removed and its details
    /// returned so the account can be created.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::Expired` if the code has expired (the entry
    /// is kept so a new code can be issued), `InvalidCode` for a wrong code,
    /// and `TooManyAttempts` once the attempt limit is reached, at which point
    /// the entry is discarded.
    pub async fn verify(
        &self,
        email: &Email,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<RegistrationDetails, RegistrationError> {
        let _guard = self.inner.lock.lock().await;
        let mut entry = self
            .inner
            .pending
            .get(email)
            .await
            .ok_or(RegistrationError::NotFound)?;

        if now > entry.expires_at {
            return Err(RegistrationError::Expired);
        }

        if entry.code.matches(input) {
            self.inner.pending.invalidate(email).await;
            return Ok(entry.details);
        }

        entry.attempts += 1;
        if entry.attempts >= MAX_ATTEMPTS {
            self.inner.pending.invalidate(email).await;
            return Err(RegistrationError::TooManyAttempts);
        }

        let remaining = MAX_ATTEMPTS - entry.attempts;
        self.inner.pending.insert(email.clone(), entry).await;
        Err(RegistrationError::InvalidCode { remaining })
    }

    /// Issue a fresh code for a pending registration, resetting its expiry and
    /// attempt count.
    ///
    /// Returns the registrant's name and the new expiry.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::NotFound` if nothing is pending.
    pub async fn reissue(
        &self,
        email: &Email,
        code: VerificationCode,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), RegistrationError> {
        let _guard = self.inner.lock.lock().await;
        let mut entry = self
            .inner
            .pending
            .get(email)
            .await
            .ok_or(RegistrationError::NotFound)?;

        entry.code = code;
        entry.expires_at = now + Duration::minutes(CODE_TTL_MINUTES);
        entry.attempts = 0;
        let result = (entry.details.name.clone(), entry.expires_at);
        self.inner.pending.insert(email.clone(), entry).await;
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn details(email: &str) -> RegistrationDetails {
        RegistrationDetails {
            name: "Ada".to_string(),
            email: Email::parse(email).unwrap(),
            password_hash: "$argon2id$stub".to_string(),
            address: None,
            phone: None,
            is_admin: false,
        }
    }

    fn code(s: &str) -> VerificationCode {
        VerificationCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_verify_success_removes_entry() {
        let store = RegistrationStore::new();
        let email = Email::parse("ada@example.com").unwrap();
        let now = Utc::now();
        store.stage(details("ada@example.com"), code("123456"), now).await;

        let verified = store.verify(&email, " 123456 ", now).await.unwrap();
        assert_eq!(verified.name, "Ada");
        assert!(!store.contains(&email));
        assert_eq!(
            store.verify(&email, "123456", now).await.unwrap_err(),
            RegistrationError::NotFound
        );
    }

    #[tokio::test]
    async fn test_wrong_code_counts_attempts() {
        let store = RegistrationStore::new();
        let email = Email::parse("ada@example.com").unwrap();
        let now = Utc::now();
        store.stage(details("ada@example.com"), code("123456"), now).await;

        for expected_remaining in (1..MAX_ATTEMPTS).rev() {
            assert_eq!(
                store.verify(&email, "000000", now).await.unwrap_err(),
                RegistrationError::InvalidCode {
                    remaining: expected_remaining
                }
            );
        }
        assert_eq!(
            store.verify(&email, "000000", now).await.unwrap_err(),
            RegistrationError::TooManyAttempts
        );
        assert!(!store.contains(&email));
    }

    #[tokio::test]
    async fn test_expired_code_keeps_entry_for_resend() {
        let store = RegistrationStore::new();
        let email = Email::parse("ada@example.com").unwrap();
        let staged_at = Utc::now() - Duration::minutes(CODE_TTL_MINUTES + 1);
        store
            .stage(details("ada@example.com"), code("123456"), staged_at)
            .await;

        let now = Utc::now();
        assert_eq!(
            store.verify(&email, "123456", now).await.unwrap_err(),
            RegistrationError::Expired
        );
        assert!(store.contains(&email));

        let (name, expires_at) = store.reissue(&email, code("654321"), now).await.unwrap();
        assert_eq!(name, "Ada");
        assert!(expires_at > now);
        assert!(store.verify(&email, "123456", now).await.is_err());
        assert!(store.verify(&email, "654321", now).await.is_ok());
    }

    #[tokio::test]
    async fn test_reissue_resets_attempts() {
        let store = RegistrationStore::new();
        let email = Email::parse("ada@example.com").unwrap();
        let now = Utc::now();
        store.stage(details("ada@example.com"), code("123456"), now).await;
        for _ in 0..MAX_ATTEMPTS - 1 {
            let _ = store.verify(&email, "000000", now).await;
        }

        store.reissue(&email, code("222222"), now).await.unwrap();
        assert_eq!(
            store.verify(&email, "000000", now).await.unwrap_err(),
            RegistrationError::InvalidCode {
                remaining: MAX_ATTEMPTS - 1
            }
        );
    }

    #[tokio::test]
    async fn test_verify_unknown_email_is_not_found() {
        let store = RegistrationStore::new();
        let email = Email::parse("admin-made@example.com").unwrap();
        assert_eq!(
            store.verify(&email, "123456", Utc::now()).await.unwrap_err(),
            RegistrationError::NotFound
        );
        assert!(!store.contains(&email));
    }

    #[tokio::test]
    async fn test_reissue_unknown_email() {
        let store = RegistrationStore::new();
        let email = Email::parse("ghost@example.com").unwrap();
        assert_eq!(
            store
                .reissue(&email, code("123456"), Utc::now())
                .await
                .unwrap_err(),
            RegistrationError::NotFound
        );
    }
}
