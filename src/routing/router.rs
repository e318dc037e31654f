//! Route repository plus the atomically swapped dispatch snapshot.
//!
//! # Responsibilities
//! - Own the registered routes between builds
//! - Rebuild and publish a new [`RouterHandler`] on `refresh`
//! - Serve requests and reverse lookups from the current snapshot
//!
//! # Design Decisions
//! - Route changes are inert until `refresh()`: the tries are always built
//!   from the whole route set so ordering stays deterministic.
//! - Builds hold the repository lock, so two refreshes never interleave.
//! - Requests load the snapshot without locking; a request that started
//!   before a refresh finishes on the old snapshot.

use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;

use crate::observability::metrics;
use crate::routing::builder::ApiBuilder;
use crate::routing::context::Context;
use crate::routing::error::BuildReport;
use crate::routing::handler::{Dispatch, RouterHandler, RouterOptions};
use crate::routing::reverser::{PathArg, PathReverser};
use crate::routing::route::{Route, RouteInfo};

pub struct Router {
    repository: Mutex<ApiBuilder>,
    current: ArcSwap<RouterHandler>,
    options: RouterOptions,
}

impl Router {
    /// Builds the first snapshot. The report holds registration errors
    /// followed by build errors; the caller decides whether they are fatal.
    pub fn build(api: ApiBuilder, options: RouterOptions) -> (Router, BuildReport) {
        let mut report = api.report().clone();
        let (handler, build_report) = RouterHandler::build(api.routes(), api.mode(), options.clone());
        report.extend(build_report);
        publish_stats(&handler);

        let router = Router {
            repository: Mutex::new(api),
            current: ArcSwap::from_pointee(handler),
            options,
        };
        (router, report)
    }

    fn repository(&self) -> MutexGuard<'_, ApiBuilder> {
        // a panic inside a route update leaves the routes themselves intact
        self.repository.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The snapshot requests are currently served from.
    pub fn handler(&self) -> Arc<RouterHandler> {
        self.current.load_full()
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn serve(&self, ctx: &mut Context) -> Dispatch {
        self.current.load().serve(ctx)
    }

    /// Rebuilds the tries from the repository and swaps them in.
    pub fn refresh(&self) -> BuildReport {
        let api = self.repository();
        let (handler, report) = RouterHandler::build(api.routes(), api.mode(), self.options.clone());
        publish_stats(&handler);
        metrics::record_refresh(report.len());
        tracing::info!(
            routes = handler.routes().len(),
            tries = handler.tries().len(),
            errors = report.len(),
            "Router refreshed"
        );
        self.current.store(Arc::new(handler));
        report
    }

    /// Registers or edits routes. Nothing changes for requests until
    /// [`Router::refresh`] runs.
    pub fn with_api<R>(&self, f: impl FnOnce(&mut ApiBuilder) -> R) -> R {
        let mut api = self.repository();
        f(&mut *api)
    }

    /// Applies `f` to the named route. Returns `false` when no registered
    /// route has that name.
    pub fn update_route(&self, name: &str, f: impl FnOnce(&mut Route)) -> bool {
        match self.repository().route_mut(name) {
            Some(route) => {
                f(route);
                true
            }
            None => false,
        }
    }

    /// Routes of the current snapshot, offline ones included.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.current.load().route_infos()
    }

    /// Routes as registered, including edits not yet refreshed.
    pub fn pending_routes(&self) -> Vec<RouteInfo> {
        self.repository().routes().iter().map(Route::info).collect()
    }

    pub fn reverser(&self) -> PathReverser {
        PathReverser::new(self.handler())
    }

    pub fn path(&self, name: &str, args: &[PathArg]) -> Option<String> {
        self.reverser().path(name, args)
    }

    pub fn url(&self, name: &str, args: &[PathArg]) -> Option<String> {
        self.reverser().url(name, args)
    }

    /// Runs a route by name, offline routes included.
    pub fn exec_route(&self, name: &str, ctx: &mut Context) -> bool {
        self.current.load().exec_route(name, ctx)
    }
}

fn publish_stats(handler: &RouterHandler) {
    let online = handler.routes().iter().filter(|r| !r.is_offline()).count();
    metrics::record_routes(online, handler.routes().len() - online);
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("current", &self.current.load())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::builder::Registrar;
    use crate::routing::context::handler;

    fn router() -> Router {
        let mut api = ApiBuilder::new();
        api.get("/jobs", vec![handler(|ctx: &mut Context| ctx.write_str("jobs"))])
            .unwrap()
            .set_name("jobs");
        api.none("/internal", vec![handler(|ctx: &mut Context| ctx.write_str("internal"))])
            .unwrap()
            .set_name("internal");
        let (router, report) = Router::build(api, RouterOptions::default());
        assert!(report.is_empty());
        router
    }

    fn status(router: &Router, method: &str, path: &str) -> u16 {
        let mut ctx = Context::new(method, "", path);
        router.serve(&mut ctx);
        ctx.status().as_u16()
    }

    #[test]
    fn test_offline_change_needs_refresh() {
        let router = router();
        assert!(router.update_route("jobs", |r| {
            r.set_offline();
        }));
        assert_eq!(status(&router, "GET", "/jobs"), 200);

        assert!(router.refresh().is_empty());
        assert_eq!(status(&router, "GET", "/jobs"), 404);

        router.update_route("jobs", |r| {
            r.set_online();
        });
        router.refresh();
        assert_eq!(status(&router, "GET", "/jobs"), 200);
    }

    #[test]
    fn test_change_method_after_refresh() {
        let router = router();
        router.update_route("jobs", |r| {
            r.change_method("POST").unwrap();
        });
        router.refresh();
        assert_eq!(status(&router, "GET", "/jobs"), 404);
        assert_eq!(status(&router, "POST", "/jobs"), 200);
    }

    #[test]
    fn test_exec_offline_route() {
        let router = router();
        let mut ctx = Context::new("GET", "", "/");
        assert!(router.exec_route("internal", &mut ctx));
        assert_eq!(ctx.body(), b"internal");
    }

    #[test]
    fn test_old_snapshot_survives_refresh() {
        let router = router();
        let before = router.handler();
        router.with_api(|api| {
            api.get("/new", vec![]).unwrap();
        });
        assert!(router.path("GET/new", &[]).is_none());
        router.refresh();
        assert!(before.lookup("GET/new").is_none());
        assert_eq!(router.path("GET/new", &[]).as_deref(), Some("/new"));
        assert_eq!(router.routes().len(), 3);
        assert!(router.routes().iter().any(|r| r.offline));
    }

    #[test]
    fn test_unknown_route_update() {
        assert!(!router().update_route("missing", |_| {}));
    }

    #[test]
    fn test_pending_routes_reflect_unrefreshed_edits() {
        let router = router();
        router.update_route("jobs", |r| {
            r.set_offline();
        });
        let pending = router.pending_routes();
        assert!(pending.iter().find(|r| r.name == "jobs").unwrap().offline);
        assert!(!router.routes().iter().find(|r| r.name == "jobs").unwrap().offline);
    }
}
