//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first, see [`crate::app`])
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (echoed or generated, recorded on the span)
//! 4. Body size limits (uploads up to four images)
//! 5. CORS (credentialed, configured origins)
//! 6. Session layer (tower-sessions with `PostgreSQL` store)
//! 7. Rate limiting on `/api/auth` only (governor)
//!
//! Authentication and the inactivity timeout are enforced per handler by the
//! [`RequireUser`] and [`RequireAdmin`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{RequireAdmin, RequireUser, clear_current_user, set_current_user};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
