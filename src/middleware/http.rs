//! HTTP-level middleware, applied to every route (public or authenticated).
//!
//! - X-Request-Id: generated when missing, echoed on the response and
//!   recorded on the request span so relay logs can be correlated
//! - request tracing (TraceLayer)
//! - inbound body limit
//! - inbound timeout, derived from the outbound timeouts

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::error_handling::HandleErrorLayer;
use axum::http::{Request, StatusCode, header::HeaderName};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Relayed write bodies are JSON documents.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const REQUEST_ID_HEADER: &str = "x-request-id";

// Added on top of the slowest outbound call.
const TIMEOUT_HEADROOM: Duration = Duration::from_secs(5);

/// Inbound timeout.
///
/// Always longer than any single outbound call, so a slow backend or identity
/// provider surfaces as that handler's own error rather than a 408.
pub fn request_timeout(config: &Config) -> Duration {
    let backend = config.backend.timeout + config.backend.connect_timeout;
    backend.max(config.oidc.provider_timeout) + TIMEOUT_HEADROOM
}

pub fn apply(router: Router, request_timeout: Duration) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let layers = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }))
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            let request_id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            // path only: query strings may carry document ids and revs
            tracing::info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                request_id = %request_id,
            )
        }))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(request_timeout));

    router.layer(layers)
}
