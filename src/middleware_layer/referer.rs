use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, Uri, header};

use crate::error::AppError;

/// The host (with port, if any) the request was addressed to.
fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
}

/// Returns `true` if `referer` is an absolute URL whose host and port match
/// `host` exactly.
pub fn referer_matches_host(referer: &str, host: &str) -> bool {
    let Ok(uri) = referer.parse::<Uri>() else {
        return false;
    };

    match (uri.scheme(), uri.authority()) {
        (Some(_), Some(authority)) => {
            // Drop any `user:pass@` prefix before comparing.
            let host_port = authority
                .as_str()
                .rsplit_once('@')
                .map_or(authority.as_str(), |(_, rest)| rest);
            host_port == host
        }
        _ => false,
    }
}

/// A middleware that only lets same-host `Referer`s through.
///
/// # Arguments
///
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or `AppError::Unauthorized` rendered as one.
pub async fn require_same_host_referer(req: Request<Body>, next: Next) -> Response {
    let headers = req.headers();

    let Some(host) = request_host(headers, req.uri()) else {
        tracing::warn!("❌ Referer check: request has no host");
        return AppError::Unauthorized.into_response();
    };

    let referer = match headers.get(header::REFERER).map(|value| value.to_str()) {
        Some(Ok(referer)) => referer,
        Some(Err(_)) => {
            tracing::warn!("❌ Referer check: header is not valid text");
            return AppError::Unauthorized.into_response();
        }
        None => {
            tracing::warn!("❌ Referer check: header missing on {}", req.uri().path());
            return AppError::Unauthorized.into_response();
        }
    };

    if !referer_matches_host(referer, host) {
        tracing::warn!("❌ Referer check: {} is not from {}", referer, host);
        return AppError::Unauthorized.into_response();
    }

    next.run(req).await
}
