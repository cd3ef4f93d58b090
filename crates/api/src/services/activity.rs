//! Inactivity timeout rules.
//!
//! A session expires when the user has made no meaningful request for longer
//! than the configured timeout. Only requests that act on the user's own data
//! count as activity, so background polling cannot keep a session alive.

use axum::http::Method;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Named timeout presets, in minutes.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TimeoutPresets {
    pub short: u32,
    pub medium: u32,
    pub long: u32,
    pub extended: u32,
    pub day: u32,
}

pub const PRESETS: TimeoutPresets = TimeoutPresets {
    short: 10,
    medium: 20,
    long: 30,
    extended: 60,
    day: 1440,
};

/// Path prefixes where a mutating request counts as activity.
const TRACKED_PREFIXES: &[&str] = &[
    "/api/public/profile",
    "/api/public/change-password",
    "/api/public/profile-picture",
    "/api/public/cart",
    "/api/public/orders",
    "/api/admin/products",
    "/api/admin/users",
    "/api/admin/orders",
    "/api/auth/me",
    "/api/delivery/save",
    "/api/delivery/get",
    "/api/delivery/admin/user",
    "/api/wishlist",
];

/// Path fragments that mark a request as touching user data, whatever the
/// method.
const USER_DATA_SEGMENTS: &[&str] = &["/profile", "/cart", "/orders", "/me"];

/// Whether a request should refresh the caller's `last_activity`.
#[must_use]
pub fn is_meaningful(method: &Method, path: &str) -> bool {
    let mutating = matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    if mutating && TRACKED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    USER_DATA_SEGMENTS.iter().any(|segment| targets(path, segment))
}

/// Whether `path` contains `segment` as a whole path segment.
fn targets(path: &str, segment: &str) -> bool {
    path.match_indices(segment).any(|(start, _)| {
        let rest = &path[start + segment.len()..];
        rest.is_empty() || rest.starts_with('/')
    })
}

/// Whether more than `timeout_minutes` have passed since `anchor`.
#[must_use]
pub fn is_expired(anchor: DateTime<Utc>, now: DateTime<Utc>, timeout_minutes: u32) -> bool {
    now - anchor > Duration::minutes(i64::from(timeout_minutes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations_on_tracked_paths() {
        assert!(is_meaningful(&Method::POST, "/api/delivery/save"));
        assert!(is_meaningful(&Method::DELETE, "/api/wishlist/remove/4"));
        assert!(is_meaningful(&Method::PATCH, "/api/admin/products/9"));
        assert!(!is_meaningful(&Method::POST, "/api/messages/send"));
    }

    #[test]
    fn test_reads_of_user_data() {
        assert!(is_meaningful(&Method::GET, "/api/public/profile"));
        assert!(is_meaningful(&Method::GET, "/api/public/orders/12"));
        assert!(is_meaningful(&Method::GET, "/api/auth/me"));
        assert!(is_meaningful(&Method::GET, "/api/public/cart"));
    }

    #[test]
    fn test_polling_is_not_activity() {
        assert!(!is_meaningful(&Method::GET, "/api/messages/unread-count"));
        assert!(!is_meaningful(&Method::GET, "/api/public/products"));
        assert!(!is_meaningful(&Method::GET, "/api/wishlist/check/3"));
        // Segment match, not substring
        assert!(!is_meaningful(&Method::GET, "/api/messages/conversation"));
        assert!(!is_meaningful(&Method::GET, "/api/metrics"));
    }

    #[test]
    fn test_expiry_boundary() {
        let anchor = Utc::now();
        assert!(!is_expired(anchor, anchor + Duration::minutes(20), 20));
        assert!(is_expired(
            anchor,
            anchor + Duration::minutes(20) + Duration::seconds(1),
            20
        ));
    }

    #[test]
    fn test_presets_serialize_upper_case() {
        let json = serde_json::to_value(PRESETS).unwrap();
        assert_eq!(json["SHORT"], 10);
        assert_eq!(json["DAY"], 1440);
    }
}
