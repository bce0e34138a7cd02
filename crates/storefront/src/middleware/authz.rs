//! Admin route guard.
//!
//! The role is fetched from the `profiles` table at every evaluation, not
//! trusted from the session: a demotion takes effect on the next request,
//! and a forged session without a matching profile row denies.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use bramble_core::Role;

use crate::db::profiles::ProfileRepository;
use crate::models::{CurrentUser, session_keys};
use crate::services::authz::{Decision, SessionSnapshot, authorize};
use crate::state::AppState;

/// Extractor that requires a shopper whose profile carries a privileged
/// role.
///
/// Unauthenticated callers land on the login page; authenticated callers
/// whose role cannot be resolved to a privileged one land on the forbidden
/// page. The protected handler never runs in either case.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(
///     RequireAdmin { user, role }: RequireAdmin,
/// ) -> impl IntoResponse {
///     format!("Hello, {} ({role})!", user.email)
/// }
/// ```
pub struct RequireAdmin {
    /// The authenticated shopper.
    pub user: CurrentUser,
    /// The privileged role the profile resolved to.
    pub role: Role,
}

/// Error returned when the admin guard denies.
pub enum AdminRejection {
    /// Redirect to the login page.
    RedirectToLogin,
    /// Redirect to the forbidden page.
    RedirectToForbidden,
    /// Unauthorized response (no session layer present).
    Unauthorized,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::RedirectToForbidden => Redirect::to("/403").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AdminRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AdminRejection::Unauthorized)?;

        let user: Option<CurrentUser> = session
            .get(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten();

        let snapshot = SessionSnapshot::ready(user.as_ref().map(|u| u.id));
        let profiles = ProfileRepository::new(state.pool());

        match authorize(snapshot, &profiles).await {
            Decision::Render(role) => {
                let user = user.ok_or(AdminRejection::RedirectToLogin)?;
                Ok(Self { user, role })
            }
            Decision::RedirectToLogin => Err(AdminRejection::RedirectToLogin),
            // A settled snapshot cannot wait; treat it like a denial anyway.
            Decision::RedirectToForbidden | Decision::Wait => {
                Err(AdminRejection::RedirectToForbidden)
            }
        }
    }
}
