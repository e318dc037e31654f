//! Request multiplexer over the built tries.
//!
//! # Responsibilities
//! - Build one trie per (method, subdomain) from a sorted route set
//! - Correct unclean paths (redirect or in-place)
//! - Match the host against subdomain tries and search the path
//! - Run the matched chain, falling through same-path alternates
//! - Answer 405 with an `Allow` header or 404 on a miss
//!
//! # Design Decisions
//! - Immutable once built; the router swaps whole handlers on refresh.
//! - The first trie whose method and host apply decides the outcome: a
//!   miss there is final, so a subdomain never falls back to the root
//!   domain's routes.
//! - Host matching is skipped entirely when no route uses a subdomain.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

use crate::routing::builder::{sort_routes, DuplicateMode};
use crate::routing::context::Context;
use crate::routing::error::{BuildReport, RouteError};
use crate::routing::path::{clean_path, escape_html, host_matches_subdomain, is_clean};
use crate::routing::route::{CompiledRoute, Route, RouteInfo, ALL_METHODS};
use crate::routing::trie::{Trie, TrieMatch};

/// Dispatch behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    /// Answer 405 with an `Allow` header when the path exists under
    /// another method.
    pub fire_method_not_allowed: bool,
    /// Serve unclean paths (trailing or repeated slashes) as they are.
    pub disable_path_correction: bool,
    /// Fix unclean paths in place instead of redirecting.
    pub disable_path_correction_redirection: bool,
    /// Host (optionally with port) the dynamic subdomain is relative to,
    /// also used to build absolute URLs.
    pub vhost: Option<String>,
    pub scheme: String,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            fire_method_not_allowed: false,
            disable_path_correction: false,
            disable_path_correction_redirection: false,
            vhost: None,
            scheme: "http".to_string(),
        }
    }
}

/// How a request left the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Matched { route: String },
    Redirect { location: String },
    NotFound,
    MethodNotAllowed { allowed: Vec<&'static str> },
}

impl Dispatch {
    /// Label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            Dispatch::Matched { .. } => "matched",
            Dispatch::Redirect { .. } => "redirect",
            Dispatch::NotFound => "not_found",
            Dispatch::MethodNotAllowed { .. } => "method_not_allowed",
        }
    }
}

fn leaf_conflict(a: &CompiledRoute, b: &CompiledRoute) -> bool {
    a.path() == b.path() || (!a.validates() && !b.validates())
}

pub struct RouterHandler {
    tries: Vec<Trie<Arc<CompiledRoute>>>,
    routes: Vec<Arc<CompiledRoute>>,
    by_name: HashMap<String, Arc<CompiledRoute>>,
    has_subdomains: bool,
    overlap: bool,
    options: RouterOptions,
}

impl RouterHandler {
    /// A handler with no routes; every request is a 404.
    pub fn empty(options: RouterOptions) -> Self {
        Self {
            tries: Vec::new(),
            routes: Vec::new(),
            by_name: HashMap::new(),
            has_subdomains: false,
            overlap: false,
            options,
        }
    }

    /// Sorts `routes`, freezes them and inserts the online ones into their
    /// tries. Routes that cannot be inserted are reported and left out.
    pub fn build(routes: &[Route], mode: DuplicateMode, options: RouterOptions) -> (Self, BuildReport) {
        let mut handler = Self::empty(options);
        handler.overlap = mode == DuplicateMode::Overlap;
        let mut report = BuildReport::new();

        for route in sort_routes(routes) {
            if handler.by_name.contains_key(route.name()) {
                let err = RouteError::DuplicateName(route.name().to_string());
                tracing::warn!(error = %err, "Route left out of build");
                report.push(err);
                continue;
            }

            let compiled = Arc::new(route.compile());
            if !compiled.is_offline() {
                if let Err(err) = handler.insert(&compiled) {
                    tracing::warn!(error = %err, "Route left out of build");
                    report.push(err);
                    continue;
                }
                tracing::debug!(
                    route = %compiled.name(),
                    method = %compiled.method(),
                    subdomain = %compiled.subdomain(),
                    path = %compiled.path(),
                    "Route registered"
                );
            }
            handler.by_name.insert(compiled.name().to_string(), Arc::clone(&compiled));
            handler.routes.push(compiled);
        }

        handler.has_subdomains = handler.tries.iter().any(|t| !t.subdomain().is_empty());
        (handler, report)
    }

    fn insert(&mut self, route: &Arc<CompiledRoute>) -> Result<(), RouteError> {
        let idx = match self
            .tries
            .iter()
            .position(|t| t.method() == route.method() && t.subdomain() == route.subdomain())
        {
            Some(i) => i,
            None => {
                self.tries.push(Trie::new(route.method(), route.subdomain()));
                self.tries.len() - 1
            }
        };
        let trie = &mut self.tries[idx];

        if !self.overlap {
            let existing = trie
                .leaf(route.segments())
                .and_then(|leaf| leaf.alternates().iter().find(|e| leaf_conflict(e, route)));
            if let Some(existing) = existing {
                return Err(RouteError::Duplicate {
                    method: route.method().to_string(),
                    subdomain: route.subdomain().to_string(),
                    path: route.path().to_string(),
                    existing: existing.name().to_string(),
                });
            }
        }

        trie.insert(route.segments(), Arc::clone(route), route.validates());
        Ok(())
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// Reports whether any trie is bound to a subdomain.
    pub fn has_subdomains(&self) -> bool {
        self.has_subdomains
    }

    pub fn tries(&self) -> &[Trie<Arc<CompiledRoute>>] {
        &self.tries
    }

    /// Every built route, offline ones included, in insertion order.
    pub fn routes(&self) -> &[Arc<CompiledRoute>] {
        &self.routes
    }

    pub fn route_infos(&self) -> Vec<RouteInfo> {
        self.routes.iter().map(|r| r.info()).collect()
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<CompiledRoute>> {
        self.by_name.get(name)
    }

    fn host_applies(&self, trie: &Trie<Arc<CompiledRoute>>, host: &str) -> bool {
        !self.has_subdomains || host_matches_subdomain(host, trie.subdomain(), self.options.vhost.as_deref())
    }

    /// Dispatches the request held by `ctx`, writing the outcome into it.
    pub fn serve(&self, ctx: &mut Context) -> Dispatch {
        if !self.options.disable_path_correction && !is_clean(ctx.path()) {
            let cleaned = clean_path(ctx.path());
            if !self.options.disable_path_correction_redirection {
                return redirect(ctx, cleaned);
            }
            ctx.set_path(cleaned);
        }

        let host = ctx.host().to_string();
        let path = ctx.path().to_string();

        for trie in &self.tries {
            if trie.method() != ctx.method() || !self.host_applies(trie, &host) {
                continue;
            }
            match trie.search(&path) {
                Some(m) => return self.run_match(ctx, m),
                None => break,
            }
        }

        if self.options.fire_method_not_allowed {
            let allowed = self.allowed_methods(&host, &path);
            if !allowed.is_empty() {
                tracing::debug!(method = %ctx.method(), path = %path, allow = ?allowed, "Method not allowed");
                ctx.set_status(StatusCode::METHOD_NOT_ALLOWED);
                ctx.set_header(header::ALLOW, &allowed.join(", "));
                return Dispatch::MethodNotAllowed { allowed };
            }
        }

        tracing::debug!(method = %ctx.method(), host = %host, path = %path, "No route matched");
        ctx.set_status(StatusCode::NOT_FOUND);
        Dispatch::NotFound
    }

    fn run_match(&self, ctx: &mut Context, m: TrieMatch<'_, Arc<CompiledRoute>>) -> Dispatch {
        let alternates = m.leaf.alternates();
        for (i, route) in alternates.iter().enumerate() {
            let params = ctx.params_mut();
            params.clear();
            for (key, value) in route.param_keys().iter().zip(&m.values) {
                params.set(key.as_str(), value.as_str());
            }
            ctx.set_route_name(route.name());
            ctx.do_handlers(route.handlers());

            let more = i + 1 < alternates.len();
            let fall_through =
                more && (ctx.is_rejected() || (self.overlap && ctx.status() == StatusCode::NOT_FOUND));
            if !fall_through {
                tracing::trace!(route = %route.name(), status = %ctx.status(), "Route matched");
                return Dispatch::Matched {
                    route: route.name().to_string(),
                };
            }
            ctx.reset_response();
        }
        ctx.set_status(StatusCode::NOT_FOUND);
        Dispatch::NotFound
    }

    /// Methods, other than the one being served, whose tries match `path` on `host`.
    pub fn allowed_methods(&self, host: &str, path: &str) -> Vec<&'static str> {
        ALL_METHODS
            .into_iter()
            .filter(|method| {
                self.tries.iter().any(|t| {
                    t.method() == *method && self.host_applies(t, host) && t.search(path).is_some()
                })
            })
            .collect()
    }

    /// Runs a route's chain by name, offline routes included. Parameters
    /// are whatever the caller already put on `ctx`.
    pub fn exec_route(&self, name: &str, ctx: &mut Context) -> bool {
        match self.lookup(name) {
            Some(route) => {
                ctx.set_route_name(route.name());
                ctx.do_handlers(route.handlers());
                true
            }
            None => false,
        }
    }
}

/// Characters re-encoded when a decoded path goes back into `Location`.
const LOCATION_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn redirect(ctx: &mut Context, cleaned: String) -> Dispatch {
    let mut location = utf8_percent_encode(&cleaned, LOCATION_SET).to_string();
    if let Some(q) = ctx.query() {
        location.push('?');
        location.push_str(q);
    }

    // a 301 lets clients replay POST/PUT as GET
    let status = match ctx.method() {
        "POST" | "PUT" => StatusCode::TEMPORARY_REDIRECT,
        _ => StatusCode::MOVED_PERMANENTLY,
    };
    ctx.set_status(status);
    ctx.set_header(header::LOCATION, &location);
    if ctx.method() == "GET" {
        ctx.set_header(header::CONTENT_TYPE, "text/html; charset=utf-8");
        let note = format!("<a href=\"{}\">Moved Permanently</a>.\n", escape_html(&location));
        ctx.write_str(&note);
    }

    tracing::debug!(location = %location, status = %status, "Redirecting to clean path");
    Dispatch::Redirect { location }
}

impl std::fmt::Debug for RouterHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterHandler")
            .field("tries", &self.tries)
            .field("routes", &self.routes.len())
            .field("has_subdomains", &self.has_subdomains)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::builder::{ApiBuilder, Registrar};
    use crate::routing::context::{handler, Handler};

    fn text(body: &'static str) -> Vec<Handler> {
        vec![handler(move |ctx: &mut Context| ctx.write_str(body))]
    }

    fn build(api: ApiBuilder, options: RouterOptions) -> RouterHandler {
        let mode = api.mode();
        let (routes, report) = api.into_parts();
        assert!(report.is_empty(), "{report}");
        let (handler, report) = RouterHandler::build(&routes, mode, options);
        assert!(report.is_empty(), "{report}");
        handler
    }

    fn serve(h: &RouterHandler, method: &str, host: &str, path: &str) -> (Dispatch, Context) {
        let mut ctx = Context::new(method, host, path);
        let d = h.serve(&mut ctx);
        (d, ctx)
    }

    #[test]
    fn test_matched_route_sets_name_and_params() {
        let mut api = ApiBuilder::new();
        api.get("/user/{id:int}", text("user")).unwrap();
        let h = build(api, RouterOptions::default());

        let (d, ctx) = serve(&h, "GET", "example.com", "/user/42");
        assert_eq!(d, Dispatch::Matched { route: "GET/user/{id:int}".into() });
        assert_eq!(ctx.params().get_i64("id"), Some(42));
        assert_eq!(ctx.route_name(), Some("GET/user/{id:int}"));
        assert_eq!(ctx.body(), b"user");
    }

    #[test]
    fn test_method_not_allowed() {
        let mut api = ApiBuilder::new();
        api.get("/only-get", text("x")).unwrap();
        api.put("/only-get", text("x")).unwrap();

        let on = build(
            api,
            RouterOptions {
                fire_method_not_allowed: true,
                ..RouterOptions::default()
            },
        );
        let (d, ctx) = serve(&on, "POST", "", "/only-get");
        assert_eq!(d, Dispatch::MethodNotAllowed { allowed: vec!["GET", "PUT"] });
        assert_eq!(ctx.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ctx.headers()[header::ALLOW], "GET, PUT");

        let mut api = ApiBuilder::new();
        api.get("/only-get", text("x")).unwrap();
        let off = build(api, RouterOptions::default());
        let (d, ctx) = serve(&off, "POST", "", "/only-get");
        assert_eq!(d, Dispatch::NotFound);
        assert_eq!(ctx.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_trailing_slash_redirects() {
        let mut api = ApiBuilder::new();
        api.get("/docs", text("docs")).unwrap();
        api.post("/docs", text("docs")).unwrap();
        let h = build(api, RouterOptions::default());

        let mut ctx = Context::new("GET", "", "/docs/").with_query(Some("a=1".into()));
        let d = h.serve(&mut ctx);
        assert_eq!(d, Dispatch::Redirect { location: "/docs?a=1".into() });
        assert_eq!(ctx.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(ctx.headers()[header::LOCATION], "/docs?a=1");
        assert!(String::from_utf8_lossy(ctx.body()).contains("Moved Permanently"));

        let (_, ctx) = serve(&h, "POST", "", "/docs/");
        assert_eq!(ctx.status(), StatusCode::TEMPORARY_REDIRECT);
        assert!(ctx.body().is_empty());
    }

    #[test]
    fn test_redirect_location_is_reencoded() {
        let mut api = ApiBuilder::new();
        api.get("/files/{name}", text("file")).unwrap();
        let h = build(api, RouterOptions::default());

        let (d, ctx) = serve(&h, "GET", "", "/files/日本 doc/");
        assert_eq!(
            d,
            Dispatch::Redirect {
                location: "/files/%E6%97%A5%E6%9C%AC%20doc".into()
            }
        );
        assert_eq!(ctx.headers()[header::LOCATION], "/files/%E6%97%A5%E6%9C%AC%20doc");
    }

    #[test]
    fn test_path_fixed_in_place_without_redirection() {
        let mut api = ApiBuilder::new();
        api.get("/docs", text("docs")).unwrap();
        let h = build(
            api,
            RouterOptions {
                disable_path_correction_redirection: true,
                ..RouterOptions::default()
            },
        );
        let (d, ctx) = serve(&h, "GET", "", "//docs/");
        assert!(matches!(d, Dispatch::Matched { .. }));
        assert_eq!(ctx.path(), "/docs");
    }

    #[test]
    fn test_subdomains_do_not_cross_match() {
        let mut api = ApiBuilder::new();
        api.get("/", text("root")).unwrap();
        api.get("admin./", text("admin")).unwrap();
        api.get("*./", text("wild")).unwrap();
        let h = build(
            api,
            RouterOptions {
                vhost: Some("example.com".into()),
                ..RouterOptions::default()
            },
        );
        assert!(h.has_subdomains());

        let (_, ctx) = serve(&h, "GET", "example.com", "/");
        assert_eq!(ctx.body(), b"root");
        let (_, ctx) = serve(&h, "GET", "admin.example.com", "/");
        assert_eq!(ctx.body(), b"admin");
        let (_, ctx) = serve(&h, "GET", "user1.example.com:8080", "/");
        assert_eq!(ctx.body(), b"wild");
        let (_, ctx) = serve(&h, "GET", "127.0.0.1", "/");
        assert_eq!(ctx.body(), b"root");
    }

    #[test]
    fn test_subdomain_miss_is_final() {
        let mut api = ApiBuilder::new();
        api.get("/about", text("root")).unwrap();
        api.get("admin./", text("admin")).unwrap();
        let h = build(api, RouterOptions::default());
        let (d, _) = serve(&h, "GET", "admin.example.com", "/about");
        assert_eq!(d, Dispatch::NotFound);
    }

    #[test]
    fn test_rejected_alternate_falls_through() {
        let mut api = ApiBuilder::new();
        api.get("/u/{name}", text("name")).unwrap();
        api.get("/u/{id:int}", text("id")).unwrap();
        let h = build(api, RouterOptions::default());

        let (_, ctx) = serve(&h, "GET", "", "/u/7");
        assert_eq!(ctx.body(), b"id");
        assert_eq!(ctx.params().get_i64("id"), Some(7));

        let (d, ctx) = serve(&h, "GET", "", "/u/bob");
        assert_eq!(d, Dispatch::Matched { route: "GET/u/{name}".into() });
        assert_eq!(ctx.body(), b"name");
        assert_eq!(ctx.params().get("name"), Some("bob"));
        assert_eq!(ctx.status(), StatusCode::OK);
    }

    #[test]
    fn test_overlap_falls_through_on_not_found() {
        let mut api = ApiBuilder::new().duplicate_mode(DuplicateMode::Overlap);
        api.get(
            "/a",
            vec![handler(|ctx: &mut Context| ctx.set_status(StatusCode::NOT_FOUND))],
        )
        .unwrap();
        api.get("/a", text("second")).unwrap();
        let h = build(api, RouterOptions::default());

        let (d, ctx) = serve(&h, "GET", "", "/a");
        assert_eq!(d, Dispatch::Matched { route: "GET/a#2".into() });
        assert_eq!(ctx.body(), b"second");
    }

    #[test]
    fn test_offline_routes_are_executable_only_by_name() {
        let mut api = ApiBuilder::new();
        api.none("/hidden", text("hidden")).unwrap();
        let h = build(api, RouterOptions::default());

        let (d, _) = serve(&h, "GET", "", "/hidden");
        assert_eq!(d, Dispatch::NotFound);

        let mut ctx = Context::new("GET", "", "/");
        assert!(h.exec_route("NONE/hidden", &mut ctx));
        assert_eq!(ctx.body(), b"hidden");
        assert!(!h.exec_route("missing", &mut ctx));
    }

    #[test]
    fn test_renamed_conflict_is_reported() {
        let mut api = ApiBuilder::new();
        api.get("/a", text("a")).unwrap().set_name("same");
        api.get("/b", text("b")).unwrap().set_name("same");
        let (routes, _) = api.into_parts();
        let (h, report) = RouterHandler::build(&routes, DuplicateMode::Override, RouterOptions::default());
        assert_eq!(report.len(), 1);
        assert!(matches!(report.errors()[0], RouteError::DuplicateName(_)));
        assert_eq!(h.routes().len(), 1);
    }
}
