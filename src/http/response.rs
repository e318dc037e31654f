//! Response conversion.
//!
//! The router writes status, headers and body into the [`Context`]; this
//! module turns that into an axum response. Bodies are small and fully
//! buffered by route handlers, so no streaming is involved.

use axum::body::Body;
use axum::http::{header, HeaderValue, Method};
use axum::response::Response;

use crate::routing::Context;

/// Converts the context after dispatch into the HTTP response.
///
/// HEAD requests keep their headers (`Content-Length` included) but lose
/// the body.
pub fn into_response(ctx: Context) -> Response {
    let head = ctx.method() == Method::HEAD.as_str();
    let (status, headers, body) = ctx.into_response_parts();

    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    if !head {
        *response.body_mut() = Body::from(body);
    }
    response
}
