//! Route registration and build-time ordering.
//!
//! # Responsibilities
//! - Register routes for a method and template, alone or through parties
//! - Apply the duplicate rule when a new route conflicts with an old one
//! - Collect registration errors into a [`BuildReport`]
//! - Define the total order routes are inserted into the tries in
//!
//! # Design Decisions
//! - Registration never aborts: each failure is returned to the caller
//!   and also kept in the report.
//! - Parties are short-lived views borrowing the builder; the routes they
//!   register belong to the builder.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::routing::context::Handler;
use crate::routing::error::{BuildReport, RouteError};
use crate::routing::macros::MacroRegistry;
use crate::routing::path::{join_path, split_subdomain, DYNAMIC_SUBDOMAIN};
use crate::routing::route::{Route, ALL_METHODS, METHOD_NONE};

/// What to do when a route conflicts with one registered earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMode {
    /// Keep the earlier route and ignore the new one.
    Skip,
    /// Replace the earlier route, keeping its position.
    #[default]
    Override,
    /// Reject the new route with [`RouteError::Duplicate`].
    Error,
    /// Keep both; at request time the first one whose chain does not end
    /// in a rejection or a 404 wins.
    Overlap,
}

/// Methods shared by [`ApiBuilder`] and [`Party`].
pub trait Registrar {
    /// Registers `handlers` for `method` and `path`. The path may start
    /// with a subdomain selector such as `admin.` or `*.`.
    fn handle(&mut self, method: &str, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError>;

    fn get(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle("GET", path, handlers)
    }

    fn post(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle("POST", path, handlers)
    }

    fn put(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle("PUT", path, handlers)
    }

    fn delete(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle("DELETE", path, handlers)
    }

    fn patch(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle("PATCH", path, handlers)
    }

    fn head(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle("HEAD", path, handlers)
    }

    fn options(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle("OPTIONS", path, handlers)
    }

    fn connect(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle("CONNECT", path, handlers)
    }

    fn trace(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle("TRACE", path, handlers)
    }

    /// Registers an offline route: never dispatched, but executable by name.
    fn none(&mut self, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.handle(METHOD_NONE, path, handlers)
    }

    /// Registers the handlers for every method. Returns the names of the
    /// created routes, or the first error.
    fn any(&mut self, path: &str, handlers: Vec<Handler>) -> Result<Vec<String>, RouteError> {
        let mut names = Vec::with_capacity(ALL_METHODS.len());
        let mut first_err = None;
        for method in ALL_METHODS {
            match self.handle(method, path, handlers.clone()) {
                Ok(route) => names.push(route.name().to_string()),
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(names),
        }
    }
}

#[derive(Clone, Default)]
struct Scope {
    subdomain: String,
    prefix: String,
    begin: Vec<Handler>,
    done: Vec<Handler>,
    /// Set when the party's own prefix was invalid; every registration
    /// through it fails with this error.
    error: Option<RouteError>,
}

impl Scope {
    fn root() -> Self {
        Self {
            prefix: "/".to_string(),
            ..Self::default()
        }
    }

    fn child(&self, relative: &str) -> Scope {
        let mut child = self.clone();
        match resolve(self, METHOD_NONE, relative) {
            Ok((subdomain, prefix)) => {
                child.subdomain = subdomain;
                child.prefix = prefix;
            }
            Err(e) => child.error = Some(e),
        }
        child
    }
}

/// Splits off a subdomain selector, nests it under the scope's and joins
/// the path onto the scope's prefix.
fn resolve(scope: &Scope, method: &str, relative: &str) -> Result<(String, String), RouteError> {
    let invalid = || RouteError::InvalidPath {
        method: method.to_string(),
        path: format!("{}{}", scope.subdomain, relative),
    };
    let (sub, path) = split_subdomain(relative).ok_or_else(invalid)?;

    let subdomain = match (sub.as_str(), scope.subdomain.as_str()) {
        (s, "") => s.to_string(),
        ("", p) => p.to_string(),
        // a nested selector cannot be combined with the dynamic one
        (s, p) if s.starts_with(DYNAMIC_SUBDOMAIN) || p.starts_with(DYNAMIC_SUBDOMAIN) => {
            return Err(invalid())
        }
        (s, p) => format!("{}{}", s, p),
    };

    Ok((subdomain, join_path(&scope.prefix, &path)))
}

/// Collects routes and the errors met while registering them.
pub struct ApiBuilder {
    registry: Arc<MacroRegistry>,
    mode: DuplicateMode,
    routes: Vec<Route>,
    report: BuildReport,
    root: Scope,
    global: Vec<Handler>,
    next_order: usize,
}

impl ApiBuilder {
    /// A builder using the built-in macro functions.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(MacroRegistry::new()))
    }

    pub fn with_registry(registry: Arc<MacroRegistry>) -> Self {
        Self {
            registry,
            mode: DuplicateMode::default(),
            routes: Vec::new(),
            report: BuildReport::new(),
            root: Scope::root(),
            global: Vec::new(),
            next_order: 0,
        }
    }

    pub fn duplicate_mode(mut self, mode: DuplicateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn set_duplicate_mode(&mut self, mode: DuplicateMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> DuplicateMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<MacroRegistry> {
        &self.registry
    }

    /// Groups routes under a shared prefix or subdomain selector.
    pub fn party(&mut self, relative: &str) -> Party<'_> {
        let scope = self.root.child(relative);
        Party { api: self, scope }
    }

    /// Middleware for routes registered on the builder itself from now on.
    pub fn use_handlers(&mut self, handlers: Vec<Handler>) -> &mut Self {
        self.root.begin.extend(handlers);
        self
    }

    /// Handlers run after the main handlers of routes registered on the
    /// builder itself from now on.
    pub fn done(&mut self, handlers: Vec<Handler>) -> &mut Self {
        self.root.done.extend(handlers);
        self
    }

    /// Middleware prepended to every route, registered or yet to be.
    pub fn use_global(&mut self, handlers: Vec<Handler>) -> &mut Self {
        for route in &mut self.routes {
            route.use_handlers(&handlers);
        }
        let mut global = handlers;
        global.append(&mut self.global);
        self.global = global;
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name() == name)
    }

    /// Mutable access to a registered route. Changes are inert until the
    /// router is rebuilt.
    pub fn route_mut(&mut self, name: &str) -> Option<&mut Route> {
        self.routes.iter_mut().find(|r| r.name() == name)
    }

    /// Errors collected so far.
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn into_parts(self) -> (Vec<Route>, BuildReport) {
        (self.routes, self.report)
    }

    fn register(
        &mut self,
        scope: &Scope,
        method: &str,
        path: &str,
        handlers: Vec<Handler>,
    ) -> Result<&mut Route, RouteError> {
        match self.try_register(scope, method, path, handlers) {
            Ok(i) => Ok(&mut self.routes[i]),
            Err(e) => {
                tracing::warn!(method, path, error = %e, "Route registration failed");
                self.report.push(e.clone());
                Err(e)
            }
        }
    }

    fn try_register(
        &mut self,
        scope: &Scope,
        method: &str,
        path: &str,
        handlers: Vec<Handler>,
    ) -> Result<usize, RouteError> {
        if let Some(e) = &scope.error {
            return Err(e.clone());
        }
        let (subdomain, full) = resolve(scope, method, path)?;

        let mut route = Route::new(method, &subdomain, &full, handlers, &self.registry)?;
        route.use_handlers(&scope.begin);
        route.use_handlers(&self.global);
        route.done(&scope.done);

        if let Some(i) = self.routes.iter().position(|r| r.conflicts_with(&route)) {
            match self.mode {
                DuplicateMode::Skip => {
                    tracing::debug!(route = %route.name(), "Skipping duplicate route");
                    return Ok(i);
                }
                DuplicateMode::Override => {
                    tracing::debug!(route = %route.name(), "Overriding duplicate route");
                    route.set_order(self.routes[i].order());
                    self.routes[i] = route;
                    return Ok(i);
                }
                DuplicateMode::Error => {
                    return Err(RouteError::Duplicate {
                        method: route.method().to_string(),
                        subdomain: route.subdomain().to_string(),
                        path: route.path().to_string(),
                        existing: self.routes[i].name().to_string(),
                    });
                }
                DuplicateMode::Overlap => {
                    let base = route.name().to_string();
                    let taken = self
                        .routes
                        .iter()
                        .filter(|r| r.name() == base || r.name().starts_with(&format!("{}#", base)))
                        .count();
                    if taken > 0 {
                        route.set_name(format!("{}#{}", base, taken + 1));
                    }
                }
            }
        }

        route.set_order(self.next_order);
        self.next_order += 1;
        self.routes.push(route);
        Ok(self.routes.len() - 1)
    }
}

impl Default for ApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Registrar for ApiBuilder {
    fn handle(&mut self, method: &str, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        let scope = self.root.clone();
        self.register(&scope, method, path, handlers)
    }
}

/// A group of routes sharing a prefix, a subdomain and middleware.
pub struct Party<'a> {
    api: &'a mut ApiBuilder,
    scope: Scope,
}

impl Party<'_> {
    pub fn party(&mut self, relative: &str) -> Party<'_> {
        let scope = self.scope.child(relative);
        Party {
            api: &mut *self.api,
            scope,
        }
    }

    /// Middleware for routes registered through this party from now on.
    pub fn use_handlers(&mut self, handlers: Vec<Handler>) -> &mut Self {
        self.scope.begin.extend(handlers);
        self
    }

    pub fn done(&mut self, handlers: Vec<Handler>) -> &mut Self {
        self.scope.done.extend(handlers);
        self
    }

    pub fn subdomain(&self) -> &str {
        &self.scope.subdomain
    }

    pub fn prefix(&self) -> &str {
        &self.scope.prefix
    }
}

impl Registrar for Party<'_> {
    fn handle(&mut self, method: &str, path: &str, handlers: Vec<Handler>) -> Result<&mut Route, RouteError> {
        self.api.register(&self.scope, method, path, handlers)
    }
}

/// Named subdomains rank ahead of `*.`, which ranks ahead of the root domain.
fn subdomain_rank(subdomain: &str) -> u8 {
    match subdomain {
        "" => 2,
        DYNAMIC_SUBDOMAIN => 1,
        _ => 0,
    }
}

/// Total order routes are inserted in: named subdomains first (longer ones
/// first), then the dynamic subdomain, then the root domain; then by method,
/// then deeper paths first with static templates ahead of dynamic ones at
/// the same depth, then registration order.
pub fn route_order(a: &Route, b: &Route) -> Ordering {
    subdomain_rank(a.subdomain())
        .cmp(&subdomain_rank(b.subdomain()))
        .then_with(|| b.subdomain().len().cmp(&a.subdomain().len()))
        .then_with(|| a.subdomain().cmp(b.subdomain()))
        .then_with(|| a.method().cmp(b.method()))
        .then_with(|| b.slash_count().cmp(&a.slash_count()))
        .then_with(|| b.is_static().cmp(&a.is_static()))
        .then_with(|| a.order().cmp(&b.order()))
}

/// Returns the routes sorted by [`route_order`].
pub fn sort_routes(routes: &[Route]) -> Vec<&Route> {
    let mut sorted: Vec<&Route> = routes.iter().collect();
    sorted.sort_by(|a, b| route_order(a, b));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::context::{handler, Context};

    fn h(text: &'static str) -> Vec<Handler> {
        vec![handler(move |ctx: &mut Context| ctx.write_str(text))]
    }

    fn run(route: &Route) -> String {
        let mut ctx = Context::new(route.method(), "", route.path());
        ctx.do_handlers(&route.chain());
        String::from_utf8(ctx.body().to_vec()).unwrap()
    }

    #[test]
    fn test_party_prefix_and_middleware() {
        let mut api = ApiBuilder::new();
        {
            let mut users = api.party("/users");
            users.use_handlers(h("auth;"));
            users.done(h("log;"));
            users.get("/{id}", h("show;")).unwrap();
            let mut nested = users.party("/{id}/posts");
            nested.get("/", h("posts;")).unwrap();
        }
        api.get("/health", h("ok;")).unwrap();

        let show = api.route("GET/users/{id}").unwrap();
        assert_eq!(run(show), "auth;show;log;");
        let posts = api.route("GET/users/{id}/posts").unwrap();
        assert_eq!(run(posts), "auth;posts;log;");
        assert_eq!(run(api.route("GET/health").unwrap()), "ok;");
    }

    #[test]
    fn test_subdomain_party() {
        let mut api = ApiBuilder::new();
        {
            let mut admin = api.party("admin.");
            assert_eq!(admin.subdomain(), "admin.");
            admin.get("/", h("admin")).unwrap();
            let mut v1 = admin.party("v1./api");
            assert_eq!(v1.subdomain(), "v1.admin.");
            v1.get("/x", h("x")).unwrap();
        }
        api.get("*./profile", h("p")).unwrap();

        let admin = api.route("GETadmin./").unwrap();
        assert_eq!(admin.subdomain(), "admin.");
        assert!(api.route("GETv1.admin./api/x").is_some());
        assert_eq!(api.route("GET*./profile").unwrap().subdomain(), "*.");
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let mut api = ApiBuilder::new();
        assert!(matches!(
            api.get("admin/x", h("x")),
            Err(RouteError::InvalidPath { .. })
        ));
        {
            let mut bad = api.party("*.");
            assert!(bad.party("v1.").get("/", h("x")).is_err());
        }
        assert_eq!(api.report().len(), 2);
    }

    #[test]
    fn test_use_global_reaches_existing_and_future_routes() {
        let mut api = ApiBuilder::new();
        api.get("/a", h("a;")).unwrap();
        api.use_global(h("g;"));
        api.get("/b", h("b;")).unwrap();
        assert_eq!(run(api.route("GET/a").unwrap()), "g;a;");
        assert_eq!(run(api.route("GET/b").unwrap()), "g;b;");
    }

    #[test]
    fn test_duplicate_override_keeps_position() {
        let mut api = ApiBuilder::new();
        api.get("/a", h("first")).unwrap();
        api.get("/b", h("b")).unwrap();
        api.get("/a", h("second")).unwrap();
        assert_eq!(api.routes().len(), 2);
        assert_eq!(api.routes()[0].order(), 0);
        assert_eq!(run(&api.routes()[0]), "second");
    }

    #[test]
    fn test_duplicate_skip() {
        let mut api = ApiBuilder::new().duplicate_mode(DuplicateMode::Skip);
        api.get("/a", h("first")).unwrap();
        api.get("/a", h("second")).unwrap();
        assert_eq!(api.routes().len(), 1);
        assert_eq!(run(&api.routes()[0]), "first");
        assert!(api.report().is_empty());
    }

    #[test]
    fn test_duplicate_error() {
        let mut api = ApiBuilder::new().duplicate_mode(DuplicateMode::Error);
        api.get("/u/{id}", h("first")).unwrap();
        let err = api.get("/u/{name}", h("second")).unwrap_err();
        assert!(matches!(err, RouteError::Duplicate { .. }));
        assert_eq!(api.report().len(), 1);
        // a validating template on the same trie path is not a duplicate
        assert!(api.get("/u/{id:int}", h("typed")).is_ok());
    }

    #[test]
    fn test_duplicate_overlap_renames() {
        let mut api = ApiBuilder::new().duplicate_mode(DuplicateMode::Overlap);
        api.get("/a", h("1")).unwrap();
        api.get("/a", h("2")).unwrap();
        api.get("/a", h("3")).unwrap();
        let names: Vec<&str> = api.routes().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["GET/a", "GET/a#2", "GET/a#3"]);
    }

    #[test]
    fn test_any_registers_every_method() {
        let mut api = ApiBuilder::new();
        let names = api.any("/x", h("x")).unwrap();
        assert_eq!(names.len(), ALL_METHODS.len());
        assert!(api.route("TRACE/x").is_some());
    }

    #[test]
    fn test_sort_order() {
        let mut api = ApiBuilder::new();
        api.get("/some/{p:path}", h("")).unwrap();
        api.get("/some/static", h("")).unwrap();
        api.get("/some/{id}/deep", h("")).unwrap();
        api.get("admin./", h("")).unwrap();
        api.get("*./x", h("")).unwrap();
        api.post("/some/static", h("")).unwrap();

        let order: Vec<&str> = sort_routes(api.routes()).iter().map(|r| r.name()).collect();
        assert_eq!(
            order,
            vec![
                "GETadmin./",
                "GET*./x",
                "GET/some/{id}/deep",
                "GET/some/static",
                "GET/some/{p:path}",
                "POST/some/static",
            ]
        );
    }

    #[test]
    fn test_named_subdomain_sorts_before_dynamic_of_same_length() {
        let mut api = ApiBuilder::new();
        api.get("/news", h("")).unwrap();
        api.get("*./profile", h("")).unwrap();
        api.get("m./news", h("")).unwrap();
        api.get("shop./", h("")).unwrap();

        let order: Vec<&str> = sort_routes(api.routes()).iter().map(|r| r.name()).collect();
        assert_eq!(order, vec!["GETshop./", "GETm./news", "GET*./profile", "GET/news"]);
    }
}
