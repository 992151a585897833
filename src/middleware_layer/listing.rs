use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// Mount points of the static trees.
const STATIC_MOUNTS: [&str; 2] = ["/static", "/styles"];

/// Returns `true` for paths under a static mount that would name a directory
/// rather than a file.
pub fn is_directory_request(path: &str) -> bool {
    STATIC_MOUNTS.iter().any(|mount| {
        path == *mount
            || path
                .strip_prefix(mount)
                .is_some_and(|rest| rest.starts_with('/') && rest.ends_with('/'))
    })
}

/// A middleware that refuses directory listings under the static trees.
pub async fn deny_directory_listing(req: Request<Body>, next: Next) -> Response {
    if is_directory_request(req.uri().path()) {
        tracing::warn!("❌ Directory listing attempt: {}", req.uri().path());
        return AppError::Unauthorized.into_response();
    }

    next.run(req).await
}
