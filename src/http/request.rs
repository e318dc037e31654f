//! Request handling.
//!
//! # Responsibilities
//! - Assign every request an ID (kept from `x-request-id` when the client
//!   sent a usable one, UUID v4 otherwise) and echo it on the response
//! - Extract the routing-relevant parts (method, host, path, query) into
//!   a [`Context`]
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Host comes from the `Host` header, falling back to the URI authority
//!   (HTTP/2 requests carry `:authority` instead)

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use axum::http::{header, HeaderValue, Request, Response};
use percent_encoding::percent_decode_str;
use tower::{Layer, Service};
use uuid::Uuid;

use crate::routing::Context;

pub const X_REQUEST_ID: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation ID of one request, stored in the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_header(value: &HeaderValue) -> Option<Self> {
        let s = value.to_str().ok()?.trim();
        if s.is_empty() || s.len() > MAX_REQUEST_ID_LEN {
            return None;
        }
        Some(Self(s.to_string()))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Tower layer that assigns [`RequestId`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(RequestId::from_header)
            .unwrap_or_default();
        let header_value = HeaderValue::from_str(id.as_str()).ok();
        if let Some(value) = &header_value {
            request.headers_mut().insert(X_REQUEST_ID, value.clone());
        }
        request.extensions_mut().insert(id);

        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            if let Some(value) = header_value {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
            Ok(response)
        })
    }
}

/// Builds the router context for `request`.
pub fn dispatch_context<B>(request: &Request<B>) -> Context {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default();

    Context::new(request.method().as_str(), host, decode_path(request.uri().path()))
        .with_query(request.uri().query().map(str::to_string))
}

/// Percent-decodes a request path. A path that does not decode to valid
/// UTF-8 is routed as received.
fn decode_path(path: &str) -> String {
    match percent_decode_str(path).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    }
}
