use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    handlers,
    middleware_layer::{
        listing::deny_directory_listing, referer::require_same_host_referer,
        session::require_session,
    },
    state::AppState,
};

/// Room left on top of the file ceiling for multipart boundaries and headers.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the application router.
///
/// # Arguments
///
/// * `state` - The application state.
///
/// # Returns
///
/// The `Router` serving every endpoint.
pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let gallery_routes = Router::new()
        .route("/", get(handlers::gallery::index))
        .with_state(state.clone());

    let upload_routes = Router::new()
        .route("/upload", post(handlers::upload::upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(from_fn(require_same_host_referer))
        .route_layer(from_fn_with_state(state.clone(), require_session))
        .with_state(state.clone());

    let static_routes = Router::new()
        .nest_service(
            "/static",
            ServeDir::new(&state.config.media_root).append_index_html_on_directories(false),
        )
        .nest_service(
            "/styles",
            ServeDir::new(&state.config.styles_dir).append_index_html_on_directories(false),
        )
        .layer(from_fn(require_same_host_referer))
        .layer(from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(gallery_routes)
        .merge(upload_routes)
        .merge(static_routes)
        .fallback(handlers::gallery::not_found)
        .layer(from_fn(deny_directory_listing))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::default().include_headers(false))
                        .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                        .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
                )
                .layer(CookieManagerLayer::new()),
        )
}
