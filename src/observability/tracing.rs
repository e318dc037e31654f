//! Request spans.
//!
//! Every request gets one span carrying its request ID, so log lines from
//! the router and from route handlers can be correlated.

use axum::body::Body;
use axum::http::Request;
use tracing::Span;

use crate::http::request::RequestId;

/// Span factory for `TraceLayer::make_span_with`.
pub fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(ToString::to_string)
        .unwrap_or_default();
    let host = request
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        host = %host,
        path = %request.uri().path(),
    )
}
