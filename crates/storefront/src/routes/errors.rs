//! Error page handlers (403 and the 404 fallback).

use askama::Template;
use askama_web::WebTemplate;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Forbidden page template.
#[derive(Template, WebTemplate)]
#[template(path = "errors/forbidden.html")]
pub struct ForbiddenTemplate;

/// Not-found page template.
#[derive(Template, WebTemplate)]
#[template(path = "errors/not_found.html")]
pub struct NotFoundTemplate;

/// The page the admin guard redirects denied shoppers to.
pub async fn forbidden() -> impl IntoResponse {
    (StatusCode::FORBIDDEN, ForbiddenTemplate)
}

/// Fallback for unknown paths.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate)
}
