//! Request-scoped state handed to every handler of a matched route.

use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};

/// A route handler. Handlers run in order until one stops the chain.
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Wraps a closure into a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A path parameter value, converted by its macro type once validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Uint(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamEntry {
    pub key: String,
    pub raw: String,
    pub value: ParamValue,
}

/// Captured path parameters, in template order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<ParamEntry>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to a raw string value, replacing any previous entry.
    pub fn set(&mut self, key: impl Into<String>, raw: impl Into<String>) {
        let key = key.into();
        let raw = raw.into();
        let value = ParamValue::Str(raw.clone());
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => {
                entry.raw = raw;
                entry.value = value;
            }
            None => self.entries.push(ParamEntry { key, raw, value }),
        }
    }

    /// Returns the raw string captured for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entry(key).map(|e| e.raw.as_str())
    }

    pub fn get_value(&self, key: &str) -> Option<&ParamValue> {
        self.entry(key).map(|e| &e.value)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get_value(key)? {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Uint(v) => i64::try_from(*v).ok(),
            ParamValue::Str(s) => s.parse().ok(),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get_value(key)? {
            ParamValue::Uint(v) => Some(*v),
            ParamValue::Int(v) => u64::try_from(*v).ok(),
            ParamValue::Str(s) => s.parse().ok(),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get_value(key)? {
            ParamValue::Bool(v) => Some(*v),
            ParamValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn entry(&self, key: &str) -> Option<&ParamEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn entry_at(&self, index: usize) -> Option<&ParamEntry> {
        self.entries.get(index)
    }

    /// Replaces the converted value of the entry at `index`.
    pub fn set_value_at(&mut self, index: usize, value: ParamValue) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.value = value;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamEntry> {
        self.entries.iter()
    }
}

/// The per-request context: the already parsed request line plus the
/// response being assembled by the handler chain.
pub struct Context {
    method: String,
    host: String,
    path: String,
    query: Option<String>,
    params: Params,
    route_name: Option<String>,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    stopped: bool,
    rejected: bool,
}

impl Context {
    pub fn new(method: impl Into<String>, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            host: host.into(),
            path: path.into(),
            query: None,
            params: Params::new(),
            route_name: None,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            stopped: false,
            rejected: false,
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Name of the route that matched this request, if any.
    pub fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    pub(crate) fn set_route_name(&mut self, name: &str) {
        self.route_name = Some(name.to_string());
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Sets the status from a numeric code, falling back to 404 for codes
    /// outside the valid HTTP range.
    pub fn set_status_code(&mut self, code: u16) {
        self.status = StatusCode::from_u16(code).unwrap_or(StatusCode::NOT_FOUND);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sets a response header. Values that are not valid header text are dropped.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => tracing::warn!(header = %name, value, "Dropping invalid header value"),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, text: &str) {
        self.body.extend_from_slice(text.as_bytes());
    }

    /// Writes a plain-text body with a content type header.
    pub fn text(&mut self, text: &str) {
        self.set_header(header::CONTENT_TYPE, "text/plain; charset=utf-8");
        self.write_str(text);
    }

    /// Stops the handler chain after the current handler returns.
    pub fn stop_execution(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn reject(&mut self, status: u16) {
        self.set_status_code(status);
        self.rejected = true;
        self.stopped = true;
    }

    /// Reports whether a parameter macro rejected the captured values.
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// Runs `handlers` in order until the chain is stopped.
    pub fn do_handlers(&mut self, handlers: &[Handler]) {
        for h in handlers {
            if self.stopped {
                break;
            }
            h(self);
        }
    }

    /// Clears the response so another handler chain can run on this request.
    pub(crate) fn reset_response(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.stopped = false;
        self.rejected = false;
    }

    /// Consumes the context, returning the response parts.
    pub fn into_response_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method)
            .field("host", &self.host)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("route_name", &self.route_name)
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_set_replaces_existing_key() {
        let mut params = Params::new();
        params.set("id", "1");
        params.set("id", "2");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("id"), Some("2"));
    }

    #[test]
    fn test_params_typed_getters() {
        let mut params = Params::new();
        params.set("id", "42");
        params.set_value_at(0, ParamValue::Int(42));
        params.set("flag", "true");
        assert_eq!(params.get_i64("id"), Some(42));
        assert_eq!(params.get_u64("id"), Some(42));
        assert_eq!(params.get_bool("flag"), Some(true));
        assert_eq!(params.get_i64("missing"), None);
    }

    #[test]
    fn test_chain_stops_when_requested() {
        let chain = vec![
            handler(|ctx| ctx.write_str("a")),
            handler(|ctx| {
                ctx.write_str("b");
                ctx.stop_execution();
            }),
            handler(|ctx| ctx.write_str("c")),
        ];
        let mut ctx = Context::new("GET", "example.com", "/");
        ctx.do_handlers(&chain);
        assert_eq!(ctx.body(), b"ab");
    }

    #[test]
    fn test_invalid_status_code_falls_back_to_not_found() {
        let mut ctx = Context::new("GET", "", "/");
        ctx.set_status_code(42);
        assert_eq!(ctx.status(), StatusCode::NOT_FOUND);
        ctx.set_status_code(400);
        assert_eq!(ctx.status(), StatusCode::BAD_REQUEST);
    }
}
