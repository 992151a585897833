use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{error::AppError, state::AppState};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";

/// Extracts the session token from the request cookies.
///
/// # Arguments
///
/// * `cookies` - The request cookies.
///
/// # Returns
///
/// An `Option` containing the token if a non-empty cookie is present.
fn extract_session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// A middleware that requires a valid session cookie.
///
/// A valid session is refreshed as part of the check.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or `AppError::Unauthorized` rendered as one.
pub async fn require_session(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking session for {}", request.uri().path());

    let Some(token) = extract_session_token(&cookies) else {
        tracing::warn!("❌ No {} cookie on {}", SESSION_COOKIE, request.uri().path());
        return AppError::Unauthorized.into_response();
    };

    if !state.sessions.validate_and_refresh(&token) {
        tracing::warn!("❌ Unknown or expired session on {}", request.uri().path());
        return AppError::Unauthorized.into_response();
    }

    tracing::debug!("✅ Session valid");
    next.run(request).await
}
