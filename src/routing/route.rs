//! Registered endpoints.
//!
//! A [`Route`] is mutable until the router is built: its name, method,
//! online state and middleware can change. Building freezes each online
//! route into a [`CompiledRoute`] that the tries and the reverser share.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::routing::context::Handler;
use crate::routing::error::RouteError;
use crate::routing::macros::template::{make_handler, TemplateSegment};
use crate::routing::macros::{MacroRegistry, ParamType, Template};
use crate::routing::path::clean_template;
use crate::routing::trie::{display_path, Segment};

/// Virtual method of offline routes. They are never inserted into a trie
/// but can still be executed by name.
pub const METHOD_NONE: &str = "NONE";

/// The methods a route can be registered for, in `Allow` header order.
pub const ALL_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "DELETE", "CONNECT", "HEAD", "PATCH", "OPTIONS", "TRACE",
];

fn normalize_method(method: &str, path: &str) -> Result<String, RouteError> {
    let upper = method.trim().to_ascii_uppercase();
    if upper == METHOD_NONE || ALL_METHODS.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(RouteError::UnknownMethod {
            method: method.to_string(),
            path: path.to_string(),
        })
    }
}

fn compile_segments(template: &Template) -> Vec<Segment> {
    template
        .segments
        .iter()
        .map(|seg| match seg {
            TemplateSegment::Static(s) => Segment::Static(s.clone()),
            TemplateSegment::Param(i) => {
                let p = &template.params[*i];
                if p.ty.is_trailing() {
                    Segment::Wildcard(p.name.clone())
                } else {
                    Segment::Named(p.name.clone())
                }
            }
        })
        .collect()
}

/// Compares compiled paths, ignoring parameter names.
pub(crate) fn same_shape(a: &[Segment], b: &[Segment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Segment::Static(x), Segment::Static(y)) => x == y,
            (Segment::Named(_), Segment::Named(_)) => true,
            (Segment::Wildcard(_), Segment::Wildcard(_)) => true,
            _ => false,
        })
}

pub struct Route {
    order: usize,
    method: String,
    /// Method to restore when an offline route goes back online.
    online_method: String,
    subdomain: String,
    template: Arc<Template>,
    segments: Vec<Segment>,
    name: String,
    begin_handlers: Vec<Handler>,
    handlers: Vec<Handler>,
    done_handlers: Vec<Handler>,
    macro_handler: Option<Handler>,
}

impl Route {
    /// Parses `path` and prepares the route. `subdomain` is either empty,
    /// a selector such as `admin.` or the dynamic `*.`.
    pub fn new(
        method: &str,
        subdomain: &str,
        path: &str,
        handlers: Vec<Handler>,
        registry: &MacroRegistry,
    ) -> Result<Route, RouteError> {
        let path = clean_template(path);
        let method = normalize_method(method, &path)?;
        let template = Template::parse(&path, registry).map_err(|source| RouteError::Macro {
            method: method.clone(),
            path: path.clone(),
            source,
        })?;

        let segments = compile_segments(&template);
        let macro_handler = make_handler(&template);
        let name = format!("{}{}{}", method, subdomain, path);

        Ok(Route {
            order: 0,
            online_method: if method == METHOD_NONE {
                "GET".to_string()
            } else {
                method.clone()
            },
            method,
            subdomain: subdomain.to_string(),
            template: Arc::new(template),
            segments,
            name,
            begin_handlers: Vec::new(),
            handlers,
            done_handlers: Vec::new(),
            macro_handler,
        })
    }

    pub(crate) fn set_order(&mut self, order: usize) {
        self.order = order;
    }

    /// Registration order, used as the final sort tie-breaker.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overrides the default `method + subdomain + path` name.
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    /// The cleaned template source, without the subdomain.
    pub fn path(&self) -> &str {
        &self.template.src
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_offline(&self) -> bool {
        self.method == METHOD_NONE
    }

    /// Takes the route out of dispatch. Takes effect on the next refresh.
    pub fn set_offline(&mut self) -> &mut Self {
        if !self.is_offline() {
            self.online_method = self.method.clone();
            self.method = METHOD_NONE.to_string();
        }
        self
    }

    /// Restores the method the route had before going offline (`GET` for
    /// routes registered offline). Takes effect on the next refresh.
    pub fn set_online(&mut self) -> &mut Self {
        if self.is_offline() {
            self.method = self.online_method.clone();
        }
        self
    }

    /// Changes the method, `NONE` included. Takes effect on the next refresh.
    pub fn change_method(&mut self, method: &str) -> Result<&mut Self, RouteError> {
        let method = normalize_method(method, self.path())?;
        if method != METHOD_NONE {
            self.online_method = method.clone();
        }
        self.method = method;
        Ok(self)
    }

    /// Prepends middleware to this route's chain.
    pub fn use_handlers(&mut self, handlers: &[Handler]) -> &mut Self {
        let mut begin = handlers.to_vec();
        begin.append(&mut self.begin_handlers);
        self.begin_handlers = begin;
        self
    }

    /// Appends handlers that run after the main handlers.
    pub fn done(&mut self, handlers: &[Handler]) -> &mut Self {
        self.done_handlers.extend_from_slice(handlers);
        self
    }

    /// Reports whether a macro validation handler guards this route.
    pub fn validates(&self) -> bool {
        self.macro_handler.is_some()
    }

    pub fn is_static(&self) -> bool {
        self.template.is_static()
    }

    pub(crate) fn slash_count(&self) -> usize {
        self.template.src.matches('/').count()
    }

    /// Reports whether both routes would serve the same requests.
    ///
    /// Identical templates always conflict. Different templates that
    /// compile to the same trie path conflict only when neither validates
    /// its parameters, since nothing could then choose between them.
    pub fn conflicts_with(&self, other: &Route) -> bool {
        self.method == other.method
            && self.subdomain == other.subdomain
            && same_shape(&self.segments, &other.segments)
            && (self.template.src == other.template.src || (!self.validates() && !other.validates()))
    }

    /// begin ++ macro validation ++ main ++ done.
    pub fn chain(&self) -> Vec<Handler> {
        let mut chain = Vec::with_capacity(
            self.begin_handlers.len() + self.handlers.len() + self.done_handlers.len() + 1,
        );
        chain.extend_from_slice(&self.begin_handlers);
        chain.extend(self.macro_handler.iter().cloned());
        chain.extend_from_slice(&self.handlers);
        chain.extend_from_slice(&self.done_handlers);
        chain
    }

    /// Freezes the current state for dispatch.
    pub fn compile(&self) -> CompiledRoute {
        CompiledRoute {
            name: self.name.clone(),
            method: self.method.clone(),
            subdomain: self.subdomain.clone(),
            template: Arc::clone(&self.template),
            segments: self.segments.clone(),
            handlers: self.chain(),
            validates: self.validates(),
            param_keys: self.template.params.iter().map(|p| p.name.clone()).collect(),
        }
    }

    pub fn info(&self) -> RouteInfo {
        RouteInfo::new(
            &self.name,
            &self.method,
            &self.subdomain,
            &self.template,
            &self.segments,
            self.chain().len(),
        )
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("subdomain", &self.subdomain)
            .field("path", &self.template.src)
            .field("order", &self.order)
            .finish()
    }
}

/// A built route: the frozen handler chain plus what dispatch and reverse
/// routing need.
pub struct CompiledRoute {
    name: String,
    method: String,
    subdomain: String,
    template: Arc<Template>,
    segments: Vec<Segment>,
    handlers: Vec<Handler>,
    validates: bool,
    param_keys: Vec<String>,
}

impl CompiledRoute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    pub fn path(&self) -> &str {
        &self.template.src
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn validates(&self) -> bool {
        self.validates
    }

    /// Parameter names in template order.
    pub fn param_keys(&self) -> &[String] {
        &self.param_keys
    }

    pub fn is_offline(&self) -> bool {
        self.method == METHOD_NONE
    }

    pub fn info(&self) -> RouteInfo {
        RouteInfo::new(
            &self.name,
            &self.method,
            &self.subdomain,
            &self.template,
            &self.segments,
            self.handlers.len(),
        )
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("subdomain", &self.subdomain)
            .field("path", &self.template.src)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteParamInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub error_code: u16,
}

/// Serializable description of a route, as listed by the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub name: String,
    pub method: String,
    pub subdomain: String,
    pub path: String,
    pub trie_path: String,
    pub params: Vec<RouteParamInfo>,
    pub offline: bool,
    pub handlers: usize,
}

impl RouteInfo {
    fn new(
        name: &str,
        method: &str,
        subdomain: &str,
        template: &Template,
        segments: &[Segment],
        handlers: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            method: method.to_string(),
            subdomain: subdomain.to_string(),
            path: template.src.clone(),
            trie_path: display_path(segments),
            params: template
                .params
                .iter()
                .map(|p| RouteParamInfo {
                    name: p.name.clone(),
                    ty: p.ty.to_string(),
                    error_code: p.error_code,
                })
                .collect(),
            offline: method == METHOD_NONE,
            handlers,
        }
    }

    /// Reports whether the last parameter takes the rest of the path.
    pub fn has_trailing_param(&self) -> bool {
        self.params
            .last()
            .is_some_and(|p| ParamType::from_name(&p.ty).is_some_and(ParamType::is_trailing))
    }
}
