use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
};
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::{AppError, Result},
    middleware_layer::session::SESSION_COOKIE,
    services::catalog,
    state::AppState,
};

/// Creates the session cookie; its max-age is the server-side session TTL.
fn create_session_cookie(token: String, max_age_secs: u64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);

    cookie.set_http_only(true);
    if secure {
        cookie.set_secure(true);
    }

    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs as i64));
    cookie.set_path("/");

    cookie
}

/// Handles `GET /`: issues a session and renders the gallery.
pub async fn index(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    let token = state.sessions.issue();
    tracing::debug!("🔑 Issued session {}...", token.get(..8).unwrap_or_default());

    cookies.add(create_session_cookie(
        token,
        state.config.session_ttl.as_secs(),
        state.config.secure_cookies,
    ));

    let items = catalog::build_catalog(
        &state.config.media_root,
        &state.thumbnails,
        state.config.catalog_limit,
    )
    .await?;

    let template = tokio::fs::read_to_string(&state.config.template_path)
        .await
        .map_err(|e| {
            AppError::Internal(format!(
                "Error reading template {}: {}",
                state.config.template_path.display(),
                e
            ))
        })?;

    tracing::info!("🎬 Rendering gallery with {} video(s)", items.len());
    Ok(Html(catalog::render_gallery(&template, &items)).into_response())
}

/// Any unrouted path.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_lifetime_matches_ttl() {
        let cookie = create_session_cookie("abc".into(), 1800, false);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(1800)));
        assert_eq!(cookie.secure(), None);
    }

    #[test]
    fn production_cookie_is_secure() {
        let cookie = create_session_cookie("abc".into(), 1800, true);
        assert_eq!(cookie.secure(), Some(true));
    }
}
