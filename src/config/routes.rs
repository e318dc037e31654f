//! Turns `[[routes]]` entries into registered routes.
//!
//! Each entry becomes one handler that writes the configured status,
//! headers and body. `{name}` in the body is replaced by the captured
//! parameter of that name after the macro validation handler has run, so
//! typed parameters render in their converted form (`007` under `int`
//! renders as `7`).

use std::sync::Arc;

use axum::http::{header, HeaderName};

use crate::config::schema::{RouteConfig, ServerConfig};
use crate::routing::{handler, ApiBuilder, Context, Handler, Registrar};

#[derive(Debug, Clone, PartialEq, Eq)]
enum BodyPart {
    Text(String),
    Param(String),
}

/// A response body with `{param}` placeholders. `{{` renders a literal `{`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyTemplate {
    parts: Vec<BodyPart>,
}

impl BodyTemplate {
    pub fn parse(src: &str) -> Self {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut rest = src;
        while let Some(start) = rest.find('{') {
            text.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            if let Some(tail) = after.strip_prefix('{') {
                text.push('{');
                rest = tail;
                continue;
            }
            let Some(len) = after.find('}') else {
                text.push_str(&rest[start..]);
                rest = "";
                break;
            };
            if !text.is_empty() {
                parts.push(BodyPart::Text(std::mem::take(&mut text)));
            }
            parts.push(BodyPart::Param(after[..len].trim().to_string()));
            rest = &after[len + 1..];
        }
        text.push_str(rest);
        if !text.is_empty() {
            parts.push(BodyPart::Text(text));
        }
        Self { parts }
    }

    /// Parameter names referenced by the template, in order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            BodyPart::Param(name) => Some(name.as_str()),
            BodyPart::Text(_) => None,
        })
    }

    pub fn render(&self, ctx: &Context) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                BodyPart::Text(text) => out.push_str(text),
                BodyPart::Param(name) => {
                    if let Some(value) = ctx.params().get_value(name) {
                        out.push_str(&value.to_string());
                    }
                }
            }
        }
        out
    }
}

/// The handler answering a configured route.
pub fn respond(cfg: &RouteConfig) -> Handler {
    let status = cfg.status;
    let content_type = cfg.content_type.clone();
    let body = Arc::new(BodyTemplate::parse(&cfg.body));
    let headers: Vec<(HeaderName, String)> = cfg
        .headers
        .iter()
        .filter_map(|(name, value)| match HeaderName::try_from(name.as_str()) {
            Ok(name) => Some((name, value.clone())),
            Err(_) => {
                tracing::warn!(header = %name, path = %cfg.path, "Ignoring invalid header name");
                None
            }
        })
        .collect();

    handler(move |ctx: &mut Context| {
        ctx.set_status_code(status);
        ctx.set_header(header::CONTENT_TYPE, &content_type);
        for (name, value) in &headers {
            ctx.set_header(name.clone(), value);
        }
        let rendered = body.render(ctx);
        ctx.write_str(&rendered);
    })
}

/// Registers every configured route. Registration errors are logged by
/// the builder and kept in its report.
pub fn build_api(config: &ServerConfig) -> ApiBuilder {
    let mut api = ApiBuilder::new().duplicate_mode(config.router.duplicate);
    for cfg in &config.routes {
        let Ok(route) = api.handle(&cfg.method, &cfg.path, vec![respond(cfg)]) else {
            continue;
        };
        if let Some(name) = &cfg.name {
            route.set_name(name.clone());
        }
        if cfg.offline {
            route.set_offline();
        }
        tracing::debug!(route = %route.name(), method = %route.method(), "Configured route registered");
    }
    api
}
