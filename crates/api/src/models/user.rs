//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use oxytoxin_core::{Email, UserId, VerificationCode};

use super::cart::CartItem;

/// A store account.
///
/// Never carries the password hash or any pending codes, so it is safe to
/// serialize straight into a response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub is_admin: bool,
    #[serde(rename = "isEmailVerified")]
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub login_history: Vec<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub cart: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The instant inactivity is measured from.
    ///
    /// Accounts that have never been active count from their creation.
    #[must_use]
    pub fn activity_anchor(&self) -> DateTime<Utc> {
        self.last_activity.unwrap_or(self.created_at)
    }
}

/// A verification or password-reset code held in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCode {
    pub code: VerificationCode,
    pub expires_at: DateTime<Utc>,
}

impl StoredCode {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn user() -> User {
        let created = Utc::now() - Duration::days(3);
        User {
            id: UserId::new(1),
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            address: None,
            phone: None,
            profile_picture: None,
            is_admin: false,
            email_verified: true,
            last_login: None,
            login_history: Vec::new(),
            last_activity: None,
            password_changed_at: None,
            cart: Vec::new(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_activity_anchor_falls_back_to_creation() {
        let mut user = user();
        assert_eq!(user.activity_anchor(), user.created_at);

        let now = Utc::now();
        user.last_activity = Some(now);
        assert_eq!(user.activity_anchor(), now);
    }

    #[test]
    fn test_serialization_uses_public_names() {
        let json = serde_json::to_value(user()).unwrap();
        assert_eq!(json["isEmailVerified"], true);
        assert_eq!(json["isAdmin"], false);
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn test_stored_code_expiry() {
        let now = Utc::now();
        let code = StoredCode {
            code: VerificationCode::from_number(123_456),
            expires_at: now,
        };
        assert!(!code.is_expired(now));
        assert!(code.is_expired(now + Duration::seconds(1)));
    }
}
