//! Intercepting gateway route

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};
use swcache_core::FetchOutcome;
use swcache_proxy::{FetchRequest, FetchResponse};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Largest request body forwarded upstream (16 MB)
const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

/// Header telling clients which path produced the response
pub const SOURCE_HEADER: &str = "x-swcache";

/// Headers that describe a single connection and are not forwarded
const HOP_BY_HOP: [HeaderName; 4] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

/// Fallback handler: resolve the request against the scope and hand it to
/// the active worker, or forward it unchanged when the worker declines.
pub async fn intercept(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let body = to_bytes(body, MAX_REQUEST_BODY)
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable request body: {}", e)))?;

    // Only path and query come from the request; the origin is always the scope's
    let mut url = state.scope.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let mut headers = parts.headers;
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }

    let fetch_request = FetchRequest {
        method: parts.method,
        url,
        headers,
        body,
    };

    let (response, source) = match state.registration.handle_fetch(fetch_request.clone()).await? {
        FetchOutcome::Respond(served) => (served.response, served.source.as_str()),
        FetchOutcome::Passthrough => {
            debug!("Forwarding {} {}", fetch_request.method, fetch_request.url);
            (state.fetcher.fetch(fetch_request).await?, "passthrough")
        }
    };

    Ok(into_response(response, source))
}

fn into_response(fetched: FetchResponse, source: &'static str) -> Response {
    let mut response = Response::new(Body::from(fetched.body));
    *response.status_mut() = fetched.status;

    let headers = response.headers_mut();
    *headers = fetched.headers;
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers.insert(SOURCE_HEADER, HeaderValue::from_static(source));

    response.into_response()
}
