//! Authentication route handlers.
//!
//! Login, registration, and logout. The page and action handlers are
//! anonymous-gated: a shopper who is already signed in is sent home
//! instead of seeing the forms.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAnonymous, clear_current_user, set_current_user};
use crate::models::{CurrentUser, Profile};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the login page.
pub async fn login_page(
    _guard: RequireAnonymous,
    Query(query): Query<MessageQuery>,
) -> LoginTemplate {
    LoginTemplate {
        error: query.error,
        success: query.success,
    }
}

/// Handle a login attempt.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    _guard: RequireAnonymous,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let service = AuthService::new(state.pool());

    match service.login(&form.email, &form.password).await {
        Ok(profile) => {
            sign_in(&session, &profile).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(err @ (AuthError::InvalidCredentials | AuthError::InvalidEmail(_))) => {
            tracing::debug!(error = %err, "login rejected");
            Ok(LoginTemplate {
                error: Some("Invalid email or password.".to_string()),
                success: None,
            }
            .into_response())
        }
        Err(err) => Err(AppError::Auth(err)),
    }
}

/// Display the register page.
pub async fn register_page(_guard: RequireAnonymous) -> RegisterTemplate {
    RegisterTemplate { error: None }
}

/// Handle a registration attempt.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    _guard: RequireAnonymous,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    if form.password != form.password_confirm {
        return Ok(RegisterTemplate {
            error: Some("Passwords do not match.".to_string()),
        }
        .into_response());
    }

    let service = AuthService::new(state.pool());

    match service.register(&form.email, &form.password).await {
        Ok(profile) => {
            sign_in(&session, &profile).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(
            err @ (AuthError::InvalidEmail(_)
            | AuthError::WeakPassword(_)
            | AuthError::UserAlreadyExists),
        ) => {
            let message = match &err {
                AuthError::InvalidEmail(_) => "Please enter a valid email address.".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                _ => "An account with this email already exists.".to_string(),
            };
            tracing::debug!(error = %err, "registration rejected");
            Ok(RegisterTemplate {
                error: Some(message),
            }
            .into_response())
        }
        Err(err) => Err(AppError::Auth(err)),
    }
}

/// Handle logout.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("failed to clear session: {e}")))?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

/// Store the identity in the session and tag Sentry events with it.
async fn sign_in(session: &Session, profile: &Profile) -> Result<()> {
    let user = CurrentUser {
        id: profile.id,
        email: profile.email.clone(),
    };
    set_current_user(session, &user)
        .await
        .map_err(|e| AppError::Internal(format!("failed to write session: {e}")))?;
    set_sentry_user(&profile.id, Some(profile.email.as_str()));
    Ok(())
}
