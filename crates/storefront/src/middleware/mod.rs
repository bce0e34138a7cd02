//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! The auth/authz guards are extractors rather than layers, so each route
//! opts in explicitly.

pub mod auth;
pub mod authz;
pub mod session;

pub use auth::{OptionalAuth, RequireAnonymous, RequireAuth, clear_current_user, set_current_user};
pub use authz::RequireAdmin;
pub use session::create_session_layer;
