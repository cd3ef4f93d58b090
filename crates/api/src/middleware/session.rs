//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The session
//! cookie is encrypted with a key derived from `API_SESSION_SECRET`.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::PrivateCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ApiConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "oxy_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The `tower_sessions` table is created by the migrations.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &ApiConfig,
) -> SessionManagerLayer<PostgresStore, PrivateCookie> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_private(cookie_key(&config.session_secret))
}

/// Stretch the session secret to the 64 bytes a cookie key needs.
fn cookie_key(secret: &SecretString) -> Key {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_key_follows_secret() {
        let secret = SecretString::from("k7#Pq9!vX2@mR4$wL8^nT3&bY6*cF1%z".to_string());
        let same = SecretString::from("k7#Pq9!vX2@mR4$wL8^nT3&bY6*cF1%z".to_string());
        let other = SecretString::from("Z1%fc*6Yb&3Tn^8Lw$4Rm@2Xv!9qP#7k".to_string());

        assert_eq!(cookie_key(&secret).master(), cookie_key(&same).master());
        assert_ne!(cookie_key(&secret).master(), cookie_key(&other).master());
        assert_eq!(cookie_key(&secret).master().len(), 64);
    }
}
